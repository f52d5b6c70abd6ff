//! Prompt builder for minimal-touch dictation correction.
//!
//! [`PromptBuilder`] produces the `(system_msg, user_msg)` pair sent to any
//! OpenAI-compatible `/v1/chat/completions` endpoint.  Japanese (`"ja"`) has
//! dedicated instructions; every other language code falls back to English.
//!
//! The instructions deliberately forbid rewriting: the service may fix
//! obvious mis-transcriptions, add natural punctuation, and do conservative
//! kana→kanji conversion, but must keep the speaker's wording, fillers and
//! sentence structure intact.  The current question being answered is passed
//! as purely advisory context.

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

/// Japanese — dictated answers to daily-report questions.
const SYSTEM_INSTRUCTION_JA: &str = "\
あなたは音声入力テキストの補正システムです。
話した内容をそのまま尊重し、必要最小限の修正のみを行ってください。

補正ルール:
1. 明らかな誤字・脱字のみを修正する
2. 句読点を自然な位置に追加する
3. ひらがな→漢字変換は控えめに（一般的な単語のみ）
4. 話し方や表現を変更しない
5. 文章の構造や内容は一切変更しない
6. 「えーっと」などの自然な話し言葉はそのまま保持する
7. 補正後のテキストのみを返す（説明は不要）";

/// Generic English / multilingual fallback.
const SYSTEM_INSTRUCTION_EN: &str = "\
You are a dictation post-correction assistant.
Respect what the speaker said; apply only the minimum necessary fixes.

Rules:
1. Fix only obvious mis-transcribed words.
2. Add punctuation at natural positions.
3. Never change the speaker's wording or phrasing.
4. Never change the structure or content of the text.
5. Keep natural spoken fillers as they are.
6. Reply with ONLY the corrected text — no explanation.";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds correction prompts in chat-message format.
///
/// # Example
/// ```rust
/// use voice_report::correct::PromptBuilder;
///
/// let builder = PromptBuilder::new("ja");
/// let (system, user) = builder.build_chat("きょうわたくさんのおきゃくさま", None);
/// assert!(system.contains("補正ルール"));
/// assert!(user.contains("きょうわ"));
/// ```
pub struct PromptBuilder {
    language: String,
}

impl PromptBuilder {
    /// Create a builder for the given ISO-639-1 language code.
    ///
    /// `"ja"` selects the Japanese instructions; anything else falls back to
    /// English.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    /// Build `(system_msg, user_msg)` for an OpenAI-compatible chat endpoint.
    ///
    /// `context_hint` is the question currently being answered; it is
    /// advisory only and never copied into the corrected output.
    pub fn build_chat(&self, raw: &str, context_hint: Option<&str>) -> (String, String) {
        let system = match self.language.as_str() {
            "ja" => SYSTEM_INSTRUCTION_JA,
            _ => SYSTEM_INSTRUCTION_EN,
        }
        .to_string();

        let mut user = String::with_capacity(raw.len() + 128);
        if let Some(question) = context_hint {
            if self.language == "ja" {
                user.push_str(&format!("回答中の質問（参考情報）: {question}\n\n"));
            } else {
                user.push_str(&format!("Question being answered (context only): {question}\n\n"));
            }
        }
        if self.language == "ja" {
            user.push_str(&format!("音声入力テキスト: {raw}"));
        } else {
            user.push_str(&format!("Dictated text: {raw}"));
        }

        (system, user)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn japanese_instructions_for_ja() {
        let (system, _) = PromptBuilder::new("ja").build_chat("てすと", None);
        assert!(system.contains("補正ルール"));
        assert!(system.contains("最小限"));
    }

    #[test]
    fn english_fallback_for_unknown_language() {
        let (system, _) = PromptBuilder::new("xx").build_chat("test", None);
        assert!(system.contains("dictation post-correction"));
    }

    #[test]
    fn user_message_contains_raw_text() {
        let (_, user) = PromptBuilder::new("ja").build_chat("きょうは忙しかった", None);
        assert!(user.contains("きょうは忙しかった"));
    }

    #[test]
    fn context_hint_is_included_when_present() {
        let (_, user) = PromptBuilder::new("ja")
            .build_chat("たくさん来ました", Some("今日はどんなお客様の対応をしましたか？"));
        assert!(user.contains("今日はどんなお客様の対応をしましたか？"));
        assert!(user.contains("たくさん来ました"));
    }

    #[test]
    fn context_hint_is_omitted_when_absent() {
        let (_, user) = PromptBuilder::new("en").build_chat("hello", None);
        assert!(!user.contains("context only"));
    }
}
