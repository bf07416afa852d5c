//! Step-based progress reporting: a plain synchronous callback invoked at
//! fixed milestones within one strip operation. Safe to call from the
//! operation's own thread; no channel, no executor.

/// Milestone messages, in order.
pub(crate) const STEPS: [&str; 4] = ["reading", "removing metadata", "saving", "verifying"];

/// Borrowed progress callback: `(current_step, total_steps, message)`.
pub struct Progress<'a> {
    callback: Option<&'a mut dyn FnMut(u32, u32, &str)>,
}

impl<'a> Progress<'a> {
    /// No reporting.
    pub fn none() -> Self {
        Self { callback: None }
    }

    pub fn with(callback: &'a mut dyn FnMut(u32, u32, &str)) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub(crate) fn report(&mut self, step: u32) {
        let total = STEPS.len() as u32;
        debug_assert!(step >= 1 && step <= total);
        if let Some(cb) = self.callback.as_mut() {
            cb(step, total, STEPS[(step - 1) as usize]);
        }
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_in_order() {
        let mut seen = Vec::new();
        let mut cb = |cur: u32, total: u32, msg: &str| {
            seen.push((cur, total, msg.to_owned()));
        };
        let mut progress = Progress::with(&mut cb);
        for step in 1..=4 {
            progress.report(step);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], (1, 4, "reading".to_owned()));
        assert_eq!(seen[3], (4, 4, "verifying".to_owned()));
    }

    #[test]
    fn none_is_silent() {
        let mut progress = Progress::none();
        progress.report(1);
    }
}
