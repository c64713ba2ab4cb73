// Interactive prompts (inquire)
use crate::core::selector::{InteractiveChooser, SelectionError};
use crate::profiles::{validate_credential, validate_name, validate_url, Profile};
use inquire::validator::Validation;
use inquire::{
    Confirm, CustomUserError, InquireError, Password, PasswordDisplayMode, Select, Text,
};

/// Chooser backed by an inquire select list
///
/// A single candidate is picked without prompting.
pub struct InquireChooser;

impl InteractiveChooser for InquireChooser {
    fn choose(&self, options: &[(usize, &Profile)]) -> Result<Option<usize>, SelectionError> {
        match options.len() {
            0 => return Ok(None),
            1 => {
                println!("🎯 Only one provider available, using: {}", options[0].1.name);
                return Ok(Some(0));
            }
            _ => {}
        }

        let labels: Vec<String> = options
            .iter()
            .map(|(display_index, profile)| {
                let star = if profile.is_default { " ⭐" } else { "" };
                format!(
                    "[{}] {}{} ({})",
                    display_index, profile.name, star, profile.base_url
                )
            })
            .collect();

        let answer = Select::new("Choose a provider:", labels)
            .with_help_message("↑↓ to move, enter to select, esc to cancel")
            .raw_prompt();
        declined_as_none(answer.map(|choice| choice.index))
    }
}

/// Keep user cancellation apart from prompts that could not run
pub fn declined_as_none(
    answer: Result<usize, InquireError>,
) -> Result<Option<usize>, SelectionError> {
    match answer {
        Ok(index) => Ok(Some(index)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(SelectionError::Prompt(e.to_string())),
    }
}

/// Yes/no question; cancellation reads as "no"
pub fn confirm(message: &str, default: bool) -> bool {
    Confirm::new(message)
        .with_default(default)
        .prompt()
        .unwrap_or(false)
}

/// Ask for every field of a new profile
///
/// Returns `Ok(None)` when the user cancels.
pub fn prompt_new_profile(
    existing: &[String],
    allow_default: bool,
) -> Result<Option<Profile>, InquireError> {
    let existing = existing.to_vec();
    let name = Text::new("Provider name:")
        .with_validator(move |input: &str| -> Result<Validation, CustomUserError> {
            Ok(match validate_name(input, &existing) {
                Ok(()) => Validation::Valid,
                Err(e) => Validation::Invalid(e.into()),
            })
        })
        .prompt_skippable()?;
    let Some(name) = name else {
        return Ok(None);
    };

    let base_url = Text::new("Base URL:")
        .with_placeholder("https://api.example.com")
        .with_validator(|input: &str| -> Result<Validation, CustomUserError> {
            Ok(match validate_url(input.trim()) {
                Ok(()) => Validation::Valid,
                Err(e) => Validation::Invalid(e.into()),
            })
        })
        .prompt_skippable()?;
    let Some(base_url) = base_url else {
        return Ok(None);
    };

    let key = Password::new("API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_validator(|input: &str| -> Result<Validation, CustomUserError> {
            Ok(match validate_credential(input.trim()) {
                Ok(()) => Validation::Valid,
                Err(e) => Validation::Invalid(e.into()),
            })
        })
        .prompt_skippable()?;
    let Some(key) = key else {
        return Ok(None);
    };

    let is_default = allow_default && confirm("Make this the default provider?", false);

    Ok(Some(
        Profile::new(name.trim(), base_url.trim(), key.trim()).with_default(is_default),
    ))
}
