use serde::Serialize;

/// A/B loop markers. One action cycles through the three states:
/// set start, set end, clear.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub enum Bookmarks {
    #[default]
    NoMarks,
    StartOnly {
        start: f64,
    },
    BothSet {
        start: f64,
        end: f64,
        looping: bool,
    },
}

impl Bookmarks {
    /// Fill the next free slot with `at`, or clear both when full. A second
    /// mark earlier than the first swaps them.
    pub fn mark(&mut self, at: f64) {
        *self = match *self {
            Bookmarks::NoMarks => Bookmarks::StartOnly { start: at },
            Bookmarks::StartOnly { start } => Bookmarks::BothSet {
                start: start.min(at),
                end: start.max(at),
                looping: false,
            },
            Bookmarks::BothSet { .. } => Bookmarks::NoMarks,
        };
    }

    /// Flip looping. Does nothing unless both markers are set; returns the new
    /// looping state.
    pub fn toggle_loop(&mut self) -> bool {
        match self {
            Bookmarks::BothSet { looping, .. } => {
                *looping = !*looping;
                *looping
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        *self = Bookmarks::NoMarks;
    }

    pub fn start(&self) -> Option<f64> {
        match *self {
            Bookmarks::NoMarks => None,
            Bookmarks::StartOnly { start } | Bookmarks::BothSet { start, .. } => Some(start),
        }
    }

    pub fn end(&self) -> Option<f64> {
        match *self {
            Bookmarks::BothSet { end, .. } => Some(end),
            _ => None,
        }
    }

    pub fn is_looping(&self) -> bool {
        matches!(self, Bookmarks::BothSet { looping: true, .. })
    }

    /// Loop range when looping is enabled
    pub fn loop_range(&self) -> Option<(f64, f64)> {
        match *self {
            Bookmarks::BothSet {
                start,
                end,
                looping: true,
            } => Some((start, end)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_cycle() {
        let mut marks = Bookmarks::default();
        marks.mark(10.0);
        assert_eq!(marks, Bookmarks::StartOnly { start: 10.0 });
        marks.mark(20.0);
        assert_eq!(marks.start(), Some(10.0));
        assert_eq!(marks.end(), Some(20.0));
        assert!(!marks.is_looping());
        marks.mark(30.0);
        assert_eq!(marks, Bookmarks::NoMarks);
    }

    #[test]
    fn test_end_before_start_swaps() {
        let mut marks = Bookmarks::default();
        marks.mark(20.0);
        marks.mark(10.0);
        assert_eq!(marks.start(), Some(10.0));
        assert_eq!(marks.end(), Some(20.0));
    }

    #[test]
    fn test_toggle_loop_needs_both_marks() {
        let mut marks = Bookmarks::default();
        assert!(!marks.toggle_loop());
        marks.mark(1.0);
        assert!(!marks.toggle_loop());
        assert!(marks.loop_range().is_none());

        marks.mark(2.0);
        assert!(marks.toggle_loop());
        assert_eq!(marks.loop_range(), Some((1.0, 2.0)));
        assert!(!marks.toggle_loop());
        assert!(marks.loop_range().is_none());
    }

    #[test]
    fn test_clearing_disables_loop() {
        let mut marks = Bookmarks::default();
        marks.mark(1.0);
        marks.mark(2.0);
        marks.toggle_loop();
        marks.mark(3.0);
        assert!(!marks.is_looping());
    }
}
