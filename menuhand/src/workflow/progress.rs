/// A slice of overall job progress owned by one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressWindow {
    pub start: u8,
    pub end: u8,
}

impl ProgressWindow {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Overall percentage after `done` of `total` steps of this phase.
    pub fn at(&self, done: usize, total: usize) -> u8 {
        if total == 0 || done >= total {
            return self.end;
        }
        let span = (self.end - self.start) as usize;
        self.start + (span * done / total) as u8
    }
}

/// Setup before any phase: validation, login, restaurant switch.
pub const PREPARE: ProgressWindow = ProgressWindow::new(0, 10);

/// Where the last phase ends; the final 5% is cleanup and reporting.
pub const PHASES_END: u8 = 95;

/// Split `[start, end]` into consecutive windows proportional to `weights`.
pub fn split(start: u8, end: u8, weights: &[u32]) -> Vec<ProgressWindow> {
    let total: u32 = weights.iter().sum();
    let span = end.saturating_sub(start) as u32;
    let mut windows = Vec::with_capacity(weights.len());
    let mut acc = 0u32;
    for w in weights {
        let from = start as u32 + if total == 0 { 0 } else { span * acc / total };
        acc += w;
        let to = start as u32 + if total == 0 { span } else { span * acc / total };
        windows.push(ProgressWindow::new(from as u8, to as u8));
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_the_range_in_order() {
        let windows = split(10, 95, &[25, 45, 15]);
        assert_eq!(windows[0].start, 10);
        assert_eq!(windows[2].end, 95);
        assert!(windows.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn position_within_window() {
        let w = ProgressWindow::new(10, 30);
        assert_eq!(w.at(0, 4), 10);
        assert_eq!(w.at(2, 4), 20);
        assert_eq!(w.at(4, 4), 30);
        assert_eq!(w.at(0, 0), 30);
    }
}
