#![allow(clippy::module_name_repetitions)]

//! Interactive prompts for running the pipeline without memorizing flags.

use chrono::NaiveDate;
use dialoguer::{Input, Select};
use latency_map_models::{InvalidYearMonthError, YearMonth};

/// Actions offered by the interactive menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Process,
    RebuildAndProcess,
    BuildIndex,
    VerifyAxisOrder,
    Summary,
}

impl Action {
    pub const ALL: &[Self] = &[
        Self::Process,
        Self::RebuildAndProcess,
        Self::BuildIndex,
        Self::VerifyAxisOrder,
        Self::Summary,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Process => "Process a month",
            Self::RebuildAndProcess => "Rebuild geofence index and process a month",
            Self::BuildIndex => "Build geofence index only",
            Self::VerifyAxisOrder => "Compare polygon axis orders on a month",
            Self::Summary => "Show a processed month's summary",
        }
    }

    #[must_use]
    pub const fn needs_month(self) -> bool {
        !matches!(self, Self::BuildIndex)
    }
}

/// Prompts for an [`Action`].
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn select_action() -> Result<Action, dialoguer::Error> {
    let labels: Vec<&str> = Action::ALL.iter().map(|a| a.label()).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(Action::ALL[idx])
}

/// Interprets a typed month: empty means the month containing `today`.
///
/// # Errors
///
/// Returns [`InvalidYearMonthError`] unless the input is empty or `YYYY-MM`.
pub fn parse_month_input(input: &str, today: NaiveDate) -> Result<YearMonth, InvalidYearMonthError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(YearMonth::containing(today));
    }
    input.parse()
}

/// Prompts for the month to work on.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn prompt_month(today: NaiveDate) -> Result<YearMonth, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt("Month (YYYY-MM, empty for current month)")
        .allow_empty(true)
        .validate_with(|s: &String| -> Result<(), String> {
            parse_month_input(s, today)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    // Validated above.
    Ok(parse_month_input(&input, today).unwrap_or_else(|_| YearMonth::containing(today)))
}

/// Month for a menu action: `given` when present, otherwise a prompt for
/// actions that work on a month and the default month for the rest.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn month_for(
    action: Action,
    given: Option<YearMonth>,
    today: NaiveDate,
) -> Result<YearMonth, dialoguer::Error> {
    match given {
        Some(month) => Ok(month),
        None if action.needs_month() => prompt_month(today),
        None => Ok(YearMonth::default_for(today)),
    }
}
