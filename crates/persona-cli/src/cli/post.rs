//! `post` command: write a social post in a persona's voice.

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use persona_types::config::{ChatConfig, Locale};
use persona_types::persona::PersonaKey;
use persona_types::post::{PostLanguage, PostRequest};

use crate::state::AppState;

/// Build the request from the command-line options.
///
/// A new post defaults to the configured locale's language.
pub fn post_request(
    config: &ChatConfig,
    lang: Option<PostLanguage>,
    expand: Option<String>,
) -> PostRequest {
    match expand {
        Some(draft) => PostRequest::Expand { draft },
        None => PostRequest::New {
            language: lang.unwrap_or(match config.locale {
                Locale::Zh => PostLanguage::Zh,
                Locale::En => PostLanguage::En,
            }),
        },
    }
}

/// Request number in `0..10000`.
pub fn request_nonce() -> u32 {
    chrono::Utc::now().timestamp_subsec_micros() % 10_000
}

pub async fn generate_post(
    state: &AppState,
    key: &PersonaKey,
    lang: Option<PostLanguage>,
    expand: Option<String>,
    json: bool,
) -> Result<()> {
    let persona = state.persona(key)?;
    let generator = state.build_post_generator()?;
    let request = post_request(&state.config, lang, expand);

    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(format!("{} is writing...", persona.name));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let result = generator.generate(&persona, &request, request_nonce()).await;
    spinner.finish_and_clear();

    let content = match result {
        Ok(content) => content,
        Err(err) => anyhow::bail!(generator.failure_text(&err)),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "persona": key.to_string(),
                "language": request.language(),
                "content": content,
            }))?
        );
        return Ok(());
    }

    let just_now = match state.config.locale {
        Locale::Zh => "刚刚",
        Locale::En => "just now",
    };
    println!();
    println!(
        "  {} {}",
        style(&persona.name).cyan().bold(),
        style(format!("· {just_now}")).dim()
    );
    println!();
    for line in content.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
