//! Picks the profile to activate once every verdict is known.
//!
//! Precedence is explicit index, then the stored default, then an interactive
//! choice among available profiles. When nothing is available the selector
//! fails before looking at either.

use crate::core::network::debug_logger::get_debug_logger;
use crate::core::network::types::{ProbeReport, Verdict};
use crate::profiles::Profile;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    ExplicitIndex,
    Default,
    Interactive,
}

impl SelectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionSource::ExplicitIndex => "explicit",
            SelectionSource::Default => "default",
            SelectionSource::Interactive => "interactive",
        }
    }
}

/// The chosen profile together with the verdict that justified it
#[derive(Debug, Clone)]
pub struct SelectedProfile {
    /// Zero-based position in the profile list
    pub index: usize,
    pub profile: Profile,
    pub verdict: Verdict,
    pub source: SelectionSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no provider is currently available")]
    NoneAvailable,
    #[error("provider {0} does not exist or is not available")]
    InvalidIndex(usize),
    #[error("interactive selection failed: {0}")]
    Prompt(String),
}

/// Non-interactive part of the decision
#[derive(Debug)]
pub enum Resolution<'a> {
    Selected(SelectedProfile),
    /// Available profiles as (1-based display index, report) pairs
    NeedsInteractiveChoice(Vec<(usize, &'a ProbeReport)>),
}

/// Terminal state of a selection
#[derive(Debug)]
pub enum SelectionOutcome {
    Selected(SelectedProfile),
    Cancelled,
    Error(SelectionError),
}

impl SelectionOutcome {
    /// Process exit code for this outcome; a user cancellation is not a failure
    pub fn exit_code(&self) -> u8 {
        match self {
            SelectionOutcome::Error(_) => 1,
            _ => 0,
        }
    }
}

/// Presents available profiles and returns a zero-based index into them
///
/// `Ok(None)` means the user declined. Anything that prevented asking at all
/// is an error.
pub trait InteractiveChooser {
    fn choose(&self, options: &[(usize, &Profile)]) -> Result<Option<usize>, SelectionError>;
}

pub struct Selector;

impl Selector {
    /// Apply explicit-index and default precedence without prompting
    ///
    /// `explicit` is the 1-based index given by the user.
    pub fn resolve(
        reports: &[ProbeReport],
        explicit: Option<usize>,
    ) -> Result<Resolution<'_>, SelectionError> {
        let available: Vec<&ProbeReport> =
            reports.iter().filter(|r| r.verdict.available).collect();
        if available.is_empty() {
            return Err(SelectionError::NoneAvailable);
        }

        if let Some(display_index) = explicit {
            let report = display_index
                .checked_sub(1)
                .and_then(|i| reports.get(i))
                .filter(|r| r.verdict.available)
                .ok_or(SelectionError::InvalidIndex(display_index))?;
            return Ok(Resolution::Selected(Self::selected(
                report,
                SelectionSource::ExplicitIndex,
            )));
        }

        if let Some(report) = available.iter().find(|r| r.profile.is_default) {
            return Ok(Resolution::Selected(Self::selected(
                report,
                SelectionSource::Default,
            )));
        }

        Ok(Resolution::NeedsInteractiveChoice(
            available
                .into_iter()
                .map(|r| (r.display_index(), r))
                .collect(),
        ))
    }

    /// Run the whole decision, prompting through `chooser` if needed
    pub fn select(
        reports: &[ProbeReport],
        explicit: Option<usize>,
        chooser: &dyn InteractiveChooser,
    ) -> SelectionOutcome {
        let outcome = match Self::resolve(reports, explicit) {
            Ok(Resolution::Selected(selected)) => SelectionOutcome::Selected(selected),
            Ok(Resolution::NeedsInteractiveChoice(candidates)) => {
                let options: Vec<(usize, &Profile)> = candidates
                    .iter()
                    .map(|(display, report)| (*display, &report.profile))
                    .collect();

                match chooser.choose(&options) {
                    Ok(choice) => match choice.and_then(|i| candidates.get(i)) {
                        Some((_, report)) => SelectionOutcome::Selected(Self::selected(
                            report,
                            SelectionSource::Interactive,
                        )),
                        None => SelectionOutcome::Cancelled,
                    },
                    Err(e) => SelectionOutcome::Error(e),
                }
            }
            Err(e) => SelectionOutcome::Error(e),
        };

        let logger = get_debug_logger();
        match &outcome {
            SelectionOutcome::Selected(s) => {
                logger.selection(s.source.as_str(), Some(&s.profile.name))
            }
            SelectionOutcome::Cancelled => logger.selection("cancelled", None),
            SelectionOutcome::Error(e) => logger.selection(&e.to_string(), None),
        }

        outcome
    }

    fn selected(report: &ProbeReport, source: SelectionSource) -> SelectedProfile {
        SelectedProfile {
            index: report.index,
            profile: report.profile.clone(),
            verdict: report.verdict.clone(),
            source,
        }
    }
}
