//! Prompts for persona posts and parsing of the model's JSON reply.

use serde::Deserialize;

use persona_types::config::Locale;
use persona_types::llm::Turn;
use persona_types::persona::Persona;
use persona_types::post::{PostError, PostLanguage, PostRequest};

/// System turn for every post request: answer with one JSON object only.
pub const POST_SYSTEM_PROMPT: &str = "你是一个社交媒体动态生成器。请你只返回一个 JSON 对象，格式如下：{\"content\": \"[生成的动态正文，必须包含Markdown格式，如**粗体**、*斜体*、~~删除线~~、列表等]\"}不要在 JSON 之外添加任何解释性文字。";

const MARKDOWN_REQUIREMENTS: &str = "1. **粗体文本** (用**文本**表示)2. *斜体文本* (用*文本*表示)3. ~~删除线~~ (用~~文本~~表示)4. 列表 (用- 项目或1. 项目表示)5. [链接文本](URL) (用[文本](URL)表示)6. `代码` (用`代码`表示)";

/// The two turns sent for one post request.
///
/// `nonce` is echoed as a request number so repeated requests for the same
/// persona do not read as identical prompts.
pub fn post_turns(persona: &Persona, request: &PostRequest, nonce: u32) -> Vec<Turn> {
    vec![
        Turn::system(POST_SYSTEM_PROMPT),
        Turn::user(post_user_prompt(persona, request, nonce)),
    ]
}

pub fn post_user_prompt(persona: &Persona, request: &PostRequest, nonce: u32) -> String {
    let role = format!(
        "请你扮演以下角色：名称: {}\n简介: {}\n背景故事: {}\n",
        persona.name, persona.signature, persona.background_story
    );

    match request {
        PostRequest::New { language } => {
            let language = match language {
                PostLanguage::Zh => "请用中文写这条动态。",
                PostLanguage::En => "请用英文写这条动态。",
            };
            format!(
                "{role}请用这个角色的口吻，写一条全新的、有趣的社交媒体动态。{language}这条动态必须包含以下Markdown格式中的至少3种：{MARKDOWN_REQUIREMENTS}(请求编号: {nonce})"
            )
        }
        PostRequest::Expand { draft } => {
            let language = match request.language() {
                PostLanguage::Zh => "请用中文扩展这条动态。",
                PostLanguage::En => "请用英文扩展这条动态。",
            };
            format!(
                "{role}请用这个角色的口吻，扩展以下内容：原始内容: {draft}\n{language}扩展后的内容必须包含以下Markdown格式中的至少3种：{MARKDOWN_REQUIREMENTS}请确保扩展后的内容简洁明了，字数控制在50-150字之间。(请求编号: {nonce})"
            )
        }
    }
}

#[derive(Deserialize)]
struct PostReply {
    content: String,
}

/// Extract the post body from the model's reply.
///
/// The reply must be a JSON object with a string `content`. A surrounding
/// Markdown code fence is tolerated.
pub fn parse_post_reply(reply: &str) -> Result<String, PostError> {
    let body = strip_code_fence(reply.trim());
    let parsed: PostReply =
        serde_json::from_str(body).map_err(|e| PostError::Format(e.to_string()))?;

    if parsed.content.trim().is_empty() {
        return Err(PostError::EmptyResponse);
    }
    Ok(parsed.content)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches("json");
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Describe a post failure the way the CLI reports it.
pub fn post_failure_text(locale: Locale, error: &PostError) -> String {
    match (locale, error) {
        (Locale::Zh, PostError::Busy) => "正在处理请求，请稍后再试".to_string(),
        (Locale::Zh, PostError::EmptyResponse) => "API 返回了空内容".to_string(),
        (Locale::Zh, PostError::Format(_)) => "AI 返回的数据格式错误".to_string(),
        (Locale::Zh, PostError::Api { code, .. }) => format!("API 错误: {code}"),
        (Locale::Zh, PostError::Transport(cause)) => format!("网络请求失败: {cause}"),
        (Locale::Zh, PostError::Cancelled) => "请求已取消".to_string(),
        (Locale::En, PostError::Busy) => {
            "A request is already in progress, try again later".to_string()
        }
        (Locale::En, PostError::EmptyResponse) => "API returned empty content".to_string(),
        (Locale::En, PostError::Format(_)) => "AI returned malformed data".to_string(),
        (Locale::En, PostError::Api { code, .. }) => format!("API error: {code}"),
        (Locale::En, PostError::Transport(cause)) => format!("Network request failed: {cause}"),
        (Locale::En, PostError::Cancelled) => "Request cancelled".to_string(),
    }
}
