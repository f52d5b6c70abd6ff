//! Question source and report assembly.
//!
//! The pipeline itself is instantiated per question and knows nothing about
//! how many questions exist; this module owns the ordered question list, the
//! collected `{question, answer, question_index}` tuples, and the
//! deterministic plain-text daily-report layout built from them.
//!
//! Where the finished report goes (database, file, clipboard) is the caller's
//! business — [`format_report`] only produces the text.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Question list
// ---------------------------------------------------------------------------

/// The fixed daily-report question sequence, in asking order.
pub const REPORT_QUESTIONS: [&str; 5] = [
    "今日はどんなお客様の対応をしましたか？",
    "印象に残ったお客様はいらっしゃいましたか？",
    "今日の売上目標の達成状況はいかがでしたか？",
    "何か困ったことや気になったことはありましたか？",
    "明日に向けて意気込みや目標があれば教えてください",
];

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// One answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The question prompt as asked.
    pub question: String,
    /// The finished (corrected, possibly hand-edited) answer text.
    pub answer: String,
    /// Position of the question in the asking order.
    pub question_index: usize,
}

// ---------------------------------------------------------------------------
// AnswerSheet
// ---------------------------------------------------------------------------

/// Ordered collection of answers for one report.
///
/// Answers can be given and re-given in any order; `set_answer` upserts by
/// question index and the sheet keeps itself sorted in asking order.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    questions: Vec<String>,
    answers: Vec<Answer>,
}

impl AnswerSheet {
    /// Create a sheet for the given question list.
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions,
            answers: Vec::new(),
        }
    }

    /// Sheet over the built-in [`REPORT_QUESTIONS`].
    pub fn with_default_questions() -> Self {
        Self::new(REPORT_QUESTIONS.iter().map(|q| q.to_string()).collect())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Record (or replace) the answer for question `index`.
    ///
    /// Whitespace-only answers are ignored — an accidental empty completion
    /// never erases a previous answer.  Out-of-range indices are ignored.
    pub fn set_answer(&mut self, index: usize, answer: &str) {
        let answer = answer.trim();
        if answer.is_empty() || index >= self.questions.len() {
            return;
        }

        let entry = Answer {
            question: self.questions[index].clone(),
            answer: answer.to_string(),
            question_index: index,
        };

        match self.answers.iter_mut().find(|a| a.question_index == index) {
            Some(existing) => *existing = entry,
            None => {
                self.answers.push(entry);
                self.answers.sort_by_key(|a| a.question_index);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The question prompt at `index`, if any.
    pub fn question(&self, index: usize) -> Option<&str> {
        self.questions.get(index).map(|s| s.as_str())
    }

    /// The recorded answer for question `index`, if any.
    pub fn answer_for(&self, index: usize) -> Option<&str> {
        self.answers
            .iter()
            .find(|a| a.question_index == index)
            .map(|a| a.answer.as_str())
    }

    /// All recorded answers, sorted in asking order.
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Number of questions on the sheet.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// `true` once every question has an answer.
    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.questions.len()
    }
}

// ---------------------------------------------------------------------------
// Report formatting
// ---------------------------------------------------------------------------

const WEEKDAY_JA: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// `2026/8/6(木)` — Japanese short date with weekday.
fn format_date_ja(date: NaiveDate) -> String {
    let weekday = WEEKDAY_JA[date.weekday().num_days_from_monday() as usize];
    format!("{}/{}/{}({})", date.year(), date.month(), date.day(), weekday)
}

/// Build the plain-text daily report.
///
/// Section order is fixed and mirrors the question order; unanswered
/// questions leave their section body empty rather than being omitted, so
/// the layout stays stable.
pub fn format_report(sheet: &AnswerSheet, staff_name: &str, date: NaiveDate) -> String {
    let section = |index: usize| sheet.answer_for(index).unwrap_or("");

    format!(
        "【日報】{}　スタッフ名: {}\n\
         \n\
         ■ 本日の業務実績\n\
         {}\n\
         \n\
         ■ 印象に残った接客\n\
         {}\n\
         \n\
         ■ 売上・目標達成状況\n\
         {}\n\
         \n\
         ■ 課題・改善点\n\
         {}\n\
         \n\
         ■ 明日への目標・意気込み\n\
         {}\n\
         \n\
         ■ その他・連絡事項\n\
         なし",
        format_date_ja(date),
        staff_name,
        section(0),
        section(1),
        section(2),
        section(3),
        section(4),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sheet_has_five_questions() {
        let sheet = AnswerSheet::with_default_questions();
        assert_eq!(sheet.question_count(), 5);
        assert!(!sheet.is_complete());
        assert_eq!(sheet.question(0), Some(REPORT_QUESTIONS[0]));
    }

    #[test]
    fn set_answer_records_and_trims() {
        let mut sheet = AnswerSheet::with_default_questions();
        sheet.set_answer(0, "  常連のお客様が三名来店しました  ");
        assert_eq!(sheet.answer_for(0), Some("常連のお客様が三名来店しました"));
    }

    #[test]
    fn set_answer_upserts_by_index() {
        let mut sheet = AnswerSheet::with_default_questions();
        sheet.set_answer(1, "最初の回答");
        sheet.set_answer(1, "言い直した回答");
        assert_eq!(sheet.answer_for(1), Some("言い直した回答"));
        assert_eq!(sheet.answers().len(), 1);
    }

    #[test]
    fn answers_stay_sorted_in_asking_order() {
        let mut sheet = AnswerSheet::with_default_questions();
        sheet.set_answer(3, "三番目に答えた");
        sheet.set_answer(0, "あとから前の質問に答えた");
        let indices: Vec<usize> = sheet.answers().iter().map(|a| a.question_index).collect();
        assert_eq!(indices, vec![0, 3]);
    }

    #[test]
    fn empty_answer_never_erases_a_previous_one() {
        let mut sheet = AnswerSheet::with_default_questions();
        sheet.set_answer(0, "ちゃんとした回答");
        sheet.set_answer(0, "   ");
        assert_eq!(sheet.answer_for(0), Some("ちゃんとした回答"));
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut sheet = AnswerSheet::with_default_questions();
        sheet.set_answer(99, "どこにも入らない");
        assert!(sheet.answers().is_empty());
    }

    #[test]
    fn sheet_completes_when_every_question_is_answered() {
        let mut sheet = AnswerSheet::with_default_questions();
        for i in 0..sheet.question_count() {
            sheet.set_answer(i, "回答済み");
        }
        assert!(sheet.is_complete());
    }

    #[test]
    fn date_formats_with_japanese_weekday() {
        // 2026-08-06 is a Thursday.
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(format_date_ja(date), "2026/8/6(木)");
    }

    #[test]
    fn report_contains_header_and_all_sections() {
        let mut sheet = AnswerSheet::with_default_questions();
        sheet.set_answer(0, "カットとカラーを担当");
        sheet.set_answer(2, "目標達成しました");

        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let report = format_report(&sheet, "山田", date);

        assert!(report.starts_with("【日報】2026/8/6(木)　スタッフ名: 山田"));
        assert!(report.contains("■ 本日の業務実績\nカットとカラーを担当"));
        assert!(report.contains("■ 売上・目標達成状況\n目標達成しました"));
        // Unanswered sections are present but empty.
        assert!(report.contains("■ 印象に残った接客\n\n"));
        assert!(report.ends_with("■ その他・連絡事項\nなし"));
    }
}
