//! 대화 세션 - 질의 기록과 피드백

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 화면에 보여주는 최근 기록 수
pub const HISTORY_DISPLAY_LIMIT: usize = 5;

/// 답변 피드백
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Helpful,
    NotHelpful,
}

impl Feedback {
    pub fn label(&self) -> &'static str {
        match self {
            Feedback::Helpful => "👍 Helpful",
            Feedback::NotHelpful => "👎 Not Helpful",
        }
    }

    /// 사용자에게 보여줄 응답
    pub fn acknowledgement(&self) -> &'static str {
        match self {
            Feedback::Helpful => "Thanks for your feedback!",
            Feedback::NotHelpful => "We'll improve this in future.",
        }
    }
}

/// 질의 한 건
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
    pub feedback: Option<Feedback>,
}

/// 세션 기록 (프로세스 수명 동안만 유지)
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
            feedback: None,
        });
    }

    /// 최근 `n`개 (최신순)
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Turn> {
        self.turns.iter().rev().take(n)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// 마지막 답변에 피드백 기록
    ///
    /// 기록이 없으면 None. 이미 평가한 답변은 새 피드백으로 덮어씁니다.
    pub fn rate_last(&mut self, feedback: Feedback) -> Option<&'static str> {
        let turn = self.turns.last_mut()?;
        turn.feedback = Some(feedback);
        tracing::info!("Feedback recorded: {:?} for {:?}", feedback, turn.question);
        Some(feedback.acknowledgement())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_is_newest_first() {
        let mut history = ConversationHistory::new();
        for i in 0..7 {
            history.push(format!("q{}", i), format!("a{}", i));
        }

        let recent: Vec<&str> = history
            .recent(HISTORY_DISPLAY_LIMIT)
            .map(|t| t.question.as_str())
            .collect();
        assert_eq!(recent, vec!["q6", "q5", "q4", "q3", "q2"]);
        assert_eq!(history.recent(100).count(), 7);
    }

    #[test]
    fn test_rate_last() {
        let mut history = ConversationHistory::new();
        assert!(history.rate_last(Feedback::Helpful).is_none());

        history.push("What is LMD?", "Laser metal deposition.");
        history.push("Why preheat?", "To reduce cracking.");

        assert_eq!(
            history.rate_last(Feedback::NotHelpful),
            Some("We'll improve this in future.")
        );
        assert_eq!(
            history.rate_last(Feedback::Helpful),
            Some("Thanks for your feedback!")
        );

        let rated: Vec<Option<Feedback>> = history.recent(2).map(|t| t.feedback).collect();
        assert_eq!(rated, vec![Some(Feedback::Helpful), None]);
    }
}
