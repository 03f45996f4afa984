// reddit-transfer/src/utils/mod.rs
use anyhow::{Context, Result};
use dialoguer::{Input, Password};

/// Prompts for a required value.
pub fn prompt_value(prompt: &str) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("a value is required")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .with_context(|| format!("Failed to read input for '{}'", prompt))?;
    Ok(value.trim().to_string())
}

/// Prompts for a value the user may leave empty.
pub fn prompt_optional(prompt: &str) -> Result<Option<String>> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Failed to read input for '{}'", prompt))?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Prompts for a secret without echoing it.
pub fn prompt_secret(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .with_context(|| format!("Failed to read input for '{}'", prompt))
}
