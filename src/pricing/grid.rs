//! Target grid of (date, hour) slots.

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::Slot;

/// Every hour in `start_hour..=end_hour` of every date in
/// `start_date..=end_date`, ordered by date then hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGrid {
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_hour: u32,
    end_hour: u32,
}

impl TargetGrid {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        start_hour: u32,
        end_hour: u32,
    ) -> Result<Self> {
        if start_date > end_date {
            return Err(AppError::validation(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }
        if end_hour > 23 {
            return Err(AppError::validation(format!(
                "end_hour must be within 0-23, got {end_hour}"
            )));
        }
        if start_hour > end_hour {
            return Err(AppError::validation(format!(
                "start_hour {start_hour} is after end_hour {end_hour}"
            )));
        }
        Ok(Self {
            start_date,
            end_date,
            start_hour,
            end_hour,
        })
    }

    /// Number of slots in the grid; never zero for a valid grid.
    pub fn slot_count(&self) -> usize {
        let days = (self.end_date - self.start_date).num_days() as usize + 1;
        days * (self.end_hour - self.start_hour + 1) as usize
    }

    pub fn iter(&self) -> GridIter {
        GridIter {
            grid: *self,
            next: Slot::new(self.start_date, self.start_hour),
        }
    }
}

impl IntoIterator for &TargetGrid {
    type Item = Slot;
    type IntoIter = GridIter;

    fn into_iter(self) -> GridIter {
        self.iter()
    }
}

/// Iterator over a [`TargetGrid`]. Cloning restarts from the current position.
#[derive(Debug, Clone)]
pub struct GridIter {
    grid: TargetGrid,
    next: Option<Slot>,
}

impl Iterator for GridIter {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let current = self.next?;
        self.next = if current.hour() < self.grid.end_hour {
            Some(current.plus_hours(1))
        } else {
            current
                .date()
                .succ_opt()
                .filter(|d| *d <= self.grid.end_date)
                .and_then(|d| Slot::new(d, self.grid.start_hour))
        };
        Some(current)
    }
}
