use log::info;

use crate::data::model::DatasetGroup;
use crate::errors::DeglitchError;

/// Outcome of removing flagged records from one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elimination {
    pub before: usize,
    pub removed: usize,
}

impl Elimination {
    pub fn remaining(&self) -> usize {
        self.before - self.removed
    }

    pub fn removed_fraction(&self) -> f64 {
        if self.before == 0 {
            0.0
        } else {
            self.removed as f64 / self.before as f64
        }
    }
}

/// Remove every entry whose mask is set. `bad.len()` must equal `column.len()`.
fn drop_flagged<T>(column: &mut Vec<T>, bad: &[bool]) {
    let mut idx = 0;
    column.retain(|_| {
        let keep = !bad[idx];
        idx += 1;
        keep
    });
}

/// Delete every flagged record from all columns of `group`.
///
/// All shapes are checked before anything is touched, so a mismatched
/// mask leaves the group unchanged.
pub fn eliminate_records(group: &mut DatasetGroup, bad: &[bool]) -> Result<Elimination, DeglitchError> {
    group.check_consistent()?;
    let before = group.len();
    if bad.len() != before {
        return Err(DeglitchError::ColumnLengthMismatch {
            column: "bad index".to_string(),
            expected: before,
            found: bad.len(),
        });
    }

    drop_flagged(&mut group.series.timestamps, bad);
    for band in &mut group.series.bands {
        drop_flagged(&mut band.values, bad);
    }
    for column in group.ancillary.values_mut() {
        drop_flagged(column, bad);
    }
    group.check_consistent()?;

    let elimination = Elimination {
        before,
        removed: before - group.len(),
    };
    info!(
        "{} {}: removed {} of {} records ({:.1}%)",
        group.channel,
        group.shutter,
        elimination.removed,
        before,
        100.0 * elimination.removed_fraction()
    );
    Ok(elimination)
}
