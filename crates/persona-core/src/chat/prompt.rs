//! System prompt synthesis and in-transcript failure texts.
//!
//! The system prompt is a fixed concatenation of persona attributes; it is
//! not paraphrased or templated at runtime. Both the prompt and the failure
//! texts exist in every supported [`Locale`].

use persona_types::config::Locale;
use persona_types::llm::CompletionError;
use persona_types::persona::Persona;

/// Build the role-defining system prompt for a persona.
///
/// With no extended attributes set, the output is exactly:
/// - zh: `你现在扮演 {name}。你的背景故事是：{story}。你的简介是：{signature}。请你严格按照这个角色设定进行对话，不要暴露你是一个 AI 模型。`
/// - en: `You are now playing {name}. Background: {story}. Signature: {signature}. Stay fully in character; never reveal you are an AI model.`
///
/// Gender, age, personality, and relationship are inserted after the name
/// clause, in that order, when present.
pub fn system_prompt(persona: &Persona, locale: Locale) -> String {
    match locale {
        Locale::Zh => zh_prompt(persona),
        Locale::En => en_prompt(persona),
    }
}

fn zh_prompt(persona: &Persona) -> String {
    let mut prompt = format!("你现在扮演 {}。", persona.name);
    if let Some(gender) = &persona.gender {
        prompt.push_str(&format!("你的性别是：{gender}。"));
    }
    if let Some(age) = persona.age {
        prompt.push_str(&format!("你的年龄是：{age}。"));
    }
    if let Some(personality) = &persona.personality {
        prompt.push_str(&format!("你的性格是：{personality}。"));
    }
    if let Some(relationship) = &persona.relationship {
        prompt.push_str(&format!("你与我的关系是：{relationship}。"));
    }
    prompt.push_str(&format!(
        "你的背景故事是：{}。你的简介是：{}。请你严格按照这个角色设定进行对话，不要暴露你是一个 AI 模型。",
        persona.background_story, persona.signature
    ));
    prompt
}

fn en_prompt(persona: &Persona) -> String {
    let mut prompt = format!("You are now playing {}. ", persona.name);
    if let Some(gender) = &persona.gender {
        prompt.push_str(&format!("Gender: {gender}. "));
    }
    if let Some(age) = persona.age {
        prompt.push_str(&format!("Age: {age}. "));
    }
    if let Some(personality) = &persona.personality {
        prompt.push_str(&format!("Personality: {personality}. "));
    }
    if let Some(relationship) = &persona.relationship {
        prompt.push_str(&format!("Relationship to me: {relationship}. "));
    }
    prompt.push_str(&format!(
        "Background: {}. Signature: {}. Stay fully in character; never reveal you are an AI model.",
        persona.background_story, persona.signature
    ));
    prompt
}

/// Wrap an error description the way it appears in the UI transcript.
///
/// The wrapper is the same in every locale; only the description inside it
/// is localized.
pub fn error_message(text: &str) -> String {
    format!("[系统错误: {text}]")
}

/// Describe a completion failure (unwrapped).
pub fn failure_text(locale: Locale, error: &CompletionError) -> String {
    match (locale, error) {
        (Locale::Zh, CompletionError::EmptyResponse) => "API 返回了空内容".to_string(),
        (Locale::Zh, CompletionError::Api { code, message }) => {
            format!("API 错误: {code} {message}")
        }
        (Locale::Zh, CompletionError::Transport(cause)) => format!("网络请求失败: {cause}"),
        (Locale::Zh, CompletionError::Cancelled) => "请求已取消".to_string(),
        (Locale::En, CompletionError::EmptyResponse) => "API returned empty content".to_string(),
        (Locale::En, CompletionError::Api { code, message }) => {
            format!("API error: {code} {message}")
        }
        (Locale::En, CompletionError::Transport(cause)) => {
            format!("Network request failed: {cause}")
        }
        (Locale::En, CompletionError::Cancelled) => "Request cancelled".to_string(),
    }
}
