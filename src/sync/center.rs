use crate::models::Coordinate;

/// Holds the map center and filters out GPS noise below `threshold_deg`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterPolicy {
    current: Option<Coordinate>,
    threshold_deg: f64,
}

impl CenterPolicy {
    pub fn new(threshold_deg: f64) -> Self {
        Self {
            current: None,
            threshold_deg,
        }
    }

    pub fn current(&self) -> Option<Coordinate> {
        self.current
    }

    /// Moves the center when forced, when no center exists yet, or when either
    /// axis moved by at least the threshold. Returns whether it moved.
    pub fn set_stable(&mut self, next: Coordinate, force: bool) -> bool {
        if !next.lat.is_finite() || !next.lng.is_finite() {
            return false;
        }
        let moved = match self.current {
            None => true,
            Some(_) if force => true,
            Some(current) => {
                (next.lat - current.lat).abs() >= self.threshold_deg
                    || (next.lng - current.lng).abs() >= self.threshold_deg
            }
        };
        if moved {
            self.current = Some(next);
        }
        moved
    }
}
