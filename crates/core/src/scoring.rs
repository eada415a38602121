//! Grading of a finished attempt.
//!
//! Every question kind is compared exactly: strings by equality, multi-choice
//! selections by set equality. Short-text and essay answers therefore only
//! score when they match the stored answer character for character.

use std::collections::HashMap;

use crate::model::{Answer, Question, QuestionId, QuestionKind, QuestionOutcome, Quiz, QuizResult};

/// Whether `given` matches the question's correct answer.
#[must_use]
pub fn is_correct(question: &Question, given: &Answer) -> bool {
    match (question.kind(), question.correct_answer(), given) {
        (QuestionKind::MultiChoice, Answer::Multiple(expected), Answer::Multiple(got)) => {
            expected == got
        }
        (
            QuestionKind::SingleChoice
            | QuestionKind::TrueFalse
            | QuestionKind::ShortText
            | QuestionKind::Essay,
            Answer::Single(expected),
            Answer::Single(got),
        ) => expected == got,
        _ => false,
    }
}

/// `round(100 * earned / total)`, halves rounding up. Zero total yields 0.
#[must_use]
pub fn score_percent(earned: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let earned = earned.min(total);
    let percent = (earned * 200 + total) / (total * 2);
    u8::try_from(percent).unwrap_or(100)
}

/// Grade every question of `quiz` against the recorded answers.
///
/// Unanswered questions are incorrect.
#[must_use]
pub fn grade(
    quiz: &Quiz,
    answers: &HashMap<QuestionId, Answer>,
    time_spent_seconds: u32,
) -> QuizResult {
    let mut score_earned = 0_u64;
    let mut correct_count = 0_usize;

    let per_question: Vec<QuestionOutcome> = quiz
        .questions()
        .iter()
        .map(|question| {
            let user_answer = answers.get(&question.id()).cloned();
            let correct = user_answer
                .as_ref()
                .is_some_and(|answer| is_correct(question, answer));
            let points_earned = if correct { question.points() } else { 0 };
            if correct {
                correct_count += 1;
                score_earned += u64::from(points_earned);
            }
            QuestionOutcome {
                question_id: question.id(),
                user_answer,
                is_correct: correct,
                points_earned,
            }
        })
        .collect();

    let total_points = quiz.total_points();
    let score_percent = score_percent(score_earned, total_points);

    QuizResult {
        score_earned,
        total_points,
        score_percent,
        correct_count,
        total_questions: quiz.len(),
        time_spent_seconds,
        passed: score_percent >= quiz.passing_score_percent(),
        per_question,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, QuizId};

    fn question(
        id: u64,
        kind: QuestionKind,
        options: &[&str],
        correct: Answer,
        points: u32,
    ) -> Question {
        QuestionDraft {
            id: QuestionId::new(id),
            prompt: format!("Question {id}"),
            kind,
            options: options.iter().map(|s| (*s).to_owned()).collect(),
            correct_answer: correct,
            points,
            explanation: None,
        }
        .validate()
        .unwrap()
    }

    fn two_question_quiz(passing: u8) -> Quiz {
        Quiz::new(
            QuizId::new(1),
            "Example",
            vec![
                question(1, QuestionKind::SingleChoice, &["A", "B"], Answer::single("A"), 10),
                question(
                    2,
                    QuestionKind::MultiChoice,
                    &["X", "Y", "Z"],
                    Answer::multiple(["X", "Y"]),
                    20,
                ),
            ],
            60,
            passing,
            1,
        )
        .unwrap()
    }

    #[test]
    fn partial_multi_choice_scores_nothing() {
        let quiz = two_question_quiz(50);
        let answers = HashMap::from([
            (QuestionId::new(1), Answer::single("A")),
            (QuestionId::new(2), Answer::multiple(["X"])),
        ]);

        let result = grade(&quiz, &answers, 12);

        assert_eq!(result.score_earned, 10);
        assert_eq!(result.total_points, 30);
        assert_eq!(result.score_percent, 33);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.total_questions, 2);
        assert_eq!(result.time_spent_seconds, 12);
        assert!(!result.passed);
    }

    #[test]
    fn multi_choice_ignores_selection_order() {
        let quiz = two_question_quiz(50);
        let answers = HashMap::from([(QuestionId::new(2), Answer::multiple(["Y", "X"]))]);
        let result = grade(&quiz, &answers, 0);
        assert_eq!(result.score_earned, 20);
        assert_eq!(result.score_percent, 67);
        assert!(result.passed);
    }

    #[test]
    fn unanswered_counts_as_incorrect() {
        let quiz = two_question_quiz(0);
        let result = grade(&quiz, &HashMap::new(), 60);
        assert_eq!(result.score_earned, 0);
        assert_eq!(result.unanswered_count(), 2);
        assert!(result.per_question.iter().all(|o| !o.is_correct));
        assert!(result.passed, "a 0% pass mark passes an empty attempt");
    }

    #[test]
    fn text_answers_need_exact_match() {
        let q = question(1, QuestionKind::ShortText, &[], Answer::single("Paris"), 1);
        assert!(is_correct(&q, &Answer::single("Paris")));
        assert!(!is_correct(&q, &Answer::single("paris")));
        assert!(!is_correct(&q, &Answer::single("Paris ")));
    }

    #[test]
    fn shape_mismatch_is_incorrect() {
        let q = question(1, QuestionKind::MultiChoice, &["A", "B"], Answer::multiple(["A"]), 1);
        assert!(!is_correct(&q, &Answer::single("A")));
    }

    #[test]
    fn percent_rounds_half_up_and_stays_in_range() {
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(30, 30), 100);
        assert_eq!(score_percent(0, 30), 0);
        assert_eq!(score_percent(0, 0), 0);
        for earned in 0..=7 {
            assert!(score_percent(earned, 7) <= 100);
        }
    }
}
