use log::{info, warn};

use super::eliminate::{eliminate_records, Elimination};
use super::vote::{vote_series, BandDiagnostics, Vote, VoteOutcome};
use crate::config::EngineSettings;
use crate::data::model::{Capture, SensorChannel, ShutterState};
use crate::errors::DeglitchError;

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// What happened to one (channel, shutter) group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub channel: SensorChannel,
    pub shutter: ShutterState,
    pub voting_bands: usize,
    pub elimination: Elimination,
    pub diagnostics: Vec<BandDiagnostics>,
}

/// Summary of a processing run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// `false` when the engine was switched off.
    pub engine_ran: bool,
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    pub fn removed(&self) -> usize {
        self.groups.iter().map(|g| g.elimination.removed).sum()
    }

    pub fn group(&self, channel: SensorChannel, shutter: ShutterState) -> Option<&GroupReport> {
        self.groups
            .iter()
            .find(|g| g.channel == channel && g.shutter == shutter)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Deglitch every group of a capture in place.
///
/// All groups are shape-checked and voted before any record is removed.
/// A ragged group or insufficient data in any group aborts the run and
/// leaves the capture unchanged.
pub fn deglitch_capture(capture: &mut Capture, settings: &EngineSettings) -> Result<RunReport, DeglitchError> {
    settings.validate()?;
    for group in capture.groups.values() {
        group.check_consistent()?;
    }

    if !settings.enabled {
        warn!("deglitching disabled, {} records kept", capture.record_count());
        return Ok(RunReport::default());
    }

    let mut votes: Vec<((SensorChannel, ShutterState), Vote)> = Vec::with_capacity(capture.groups.len());
    for (&(channel, shutter), group) in &capture.groups {
        let config = settings.config_for(channel, shutter);
        match vote_series(&group.series, shutter, &config, settings) {
            VoteOutcome::Voted(vote) => {
                info!(
                    "{channel} {shutter}: {:.1}% of {} records flagged over {} bands",
                    100.0 * vote.flagged_fraction(),
                    vote.bad.len(),
                    vote.voting_bands
                );
                votes.push(((channel, shutter), vote));
            }
            VoteOutcome::InsufficientData {
                records,
                window_size,
            } => {
                return Err(DeglitchError::InsufficientData {
                    channel,
                    shutter,
                    records,
                    window_size,
                });
            }
        }
    }

    let mut report = RunReport {
        engine_ran: true,
        groups: Vec::with_capacity(votes.len()),
    };
    for ((channel, shutter), vote) in votes {
        let Some(group) = capture.group_mut(channel, shutter) else {
            continue;
        };
        let elimination = eliminate_records(group, &vote.bad)?;
        report.groups.push(GroupReport {
            channel,
            shutter,
            voting_bands: vote.voting_bands,
            elimination,
            diagnostics: vote.diagnostics,
        });
    }
    Ok(report)
}
