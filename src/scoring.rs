use crate::models::{AnswerValue, CorrectAnswer, Form, FormResponse, Question};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Preliminary score computed at submission time. Frozen on the
/// response afterwards, even if the form's answer key changes later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: i64,
    pub max_score: i64,
}

impl ScoreResult {
    /// Rounded percentage; 0 when nothing was scoreable.
    pub fn percentage(&self) -> u32 {
        if self.max_score == 0 {
            return 0;
        }
        ((self.score as f64 / self.max_score as f64) * 100.0).round() as u32
    }

    pub fn passed(&self, form: &Form) -> bool {
        self.percentage() >= form.effective_passing_mark()
    }
}

/// Grades a respondent's answers against the form's answer keys.
///
/// Pure and deterministic: only multiple-choice and checkbox questions
/// that carry both a non-empty correct answer and a positive point value
/// contribute. Text-type questions never score, even when a stray
/// `correct_answer` is present on them. A missing answer counts as
/// empty and scores zero for that question.
pub fn calculate_score(form: &Form, answers: &HashMap<String, AnswerValue>) -> ScoreResult {
    let mut score: i64 = 0;
    let mut max_score: i64 = 0;

    for question in &form.questions {
        let (key, points) = match scoreable_key(question) {
            Some(pair) => pair,
            None => continue,
        };

        max_score += points;

        if graded_correct(key, answers.get(&question.id)) {
            score += points;
        }
    }

    ScoreResult { score, max_score }
}

/// Applies the preliminary score and frozen max score to a new response.
pub fn grade_response(form: &Form, response: &mut FormResponse) {
    let result = calculate_score(form, &response.answers);
    response.preliminary_score = Some(result.score);
    response.max_score = Some(result.max_score);
}

fn scoreable_key(question: &Question) -> Option<(&CorrectAnswer, i64)> {
    if !question.kind.is_scoreable() {
        return None;
    }
    let key = question.correct_answer.as_ref().filter(|k| !k.is_empty())?;
    let points = question.points.filter(|p| *p > 0)?;
    Some((key, points as i64))
}

fn graded_correct(key: &CorrectAnswer, answer: Option<&AnswerValue>) -> bool {
    match key {
        // Single-string key: exact, case-sensitive match on a single answer.
        CorrectAnswer::One(expected) => match answer {
            Some(AnswerValue::Text(given)) => given == expected,
            // A single-element selection still counts as that one answer.
            Some(AnswerValue::Many(given)) => given.len() == 1 && given[0] == *expected,
            None => false,
        },
        // Multi-string key: set equality, all-or-nothing.
        CorrectAnswer::Many(expected) => {
            let expected: HashSet<&str> = expected.iter().map(String::as_str).collect();
            let given: HashSet<&str> = match answer {
                Some(AnswerValue::Many(v)) => v.iter().map(String::as_str).collect(),
                Some(AnswerValue::Text(s)) if !s.is_empty() => std::iter::once(s.as_str()).collect(),
                _ => HashSet::new(),
            };
            !expected.is_empty() && expected == given
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKind;

    fn question(id: &str, kind: QuestionKind, key: Option<CorrectAnswer>, points: Option<u32>) -> Question {
        Question {
            id: id.to_string(),
            kind,
            title: format!("Question {}", id),
            emoji: None,
            required: false,
            help_text: None,
            accent_color: None,
            options: None,
            rating_scale: None,
            correct_answer: key,
            points,
        }
    }

    fn quiz_form() -> Form {
        let mut form = Form::new("Capitals quiz");
        form.mode = crate::models::FormMode::Questionnaire;
        form.passing_mark = Some(70);
        form.questions = vec![
            question(
                "q1",
                QuestionKind::MultipleChoice,
                Some(CorrectAnswer::One("Paris".to_string())),
                Some(10),
            ),
            question(
                "q2",
                QuestionKind::Checkbox,
                Some(CorrectAnswer::Many(vec![
                    "JavaScript".to_string(),
                    "Python".to_string(),
                    "Java".to_string(),
                ])),
                Some(15),
            ),
        ];
        form
    }

    fn answers(pairs: &[(&str, AnswerValue)]) -> HashMap<String, AnswerValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_full_marks_scenario() {
        let form = quiz_form();
        let answers = answers(&[
            ("q1", AnswerValue::Text("Paris".to_string())),
            (
                "q2",
                AnswerValue::Many(vec![
                    "JavaScript".to_string(),
                    "Python".to_string(),
                    "Java".to_string(),
                ]),
            ),
        ]);

        let result = calculate_score(&form, &answers);
        assert_eq!(result, ScoreResult { score: 25, max_score: 25 });
        assert_eq!(result.percentage(), 100);
        assert!(result.passed(&form));
    }

    #[test]
    fn test_all_wrong_scenario() {
        let form = quiz_form();
        let answers = answers(&[
            ("q1", AnswerValue::Text("Berlin".to_string())),
            ("q2", AnswerValue::Many(vec!["JavaScript".to_string()])),
        ]);

        let result = calculate_score(&form, &answers);
        assert_eq!(result, ScoreResult { score: 0, max_score: 25 });
        assert_eq!(result.percentage(), 0);
        assert!(!result.passed(&form));
    }

    #[test]
    fn test_empty_answer_map() {
        let form = quiz_form();
        let result = calculate_score(&form, &HashMap::new());
        assert_eq!(result.score, 0);
        assert_eq!(result.max_score, 25);
    }

    #[test]
    fn test_answering_with_own_key_scores_full() {
        let form = quiz_form();
        let mut answers = HashMap::new();
        for q in &form.questions {
            let value = match q.correct_answer.as_ref().unwrap() {
                CorrectAnswer::One(s) => AnswerValue::Text(s.clone()),
                CorrectAnswer::Many(v) => AnswerValue::Many(v.clone()),
            };
            answers.insert(q.id.clone(), value);
        }
        let result = calculate_score(&form, &answers);
        assert_eq!(result.score, result.max_score);
    }

    #[test]
    fn test_checkbox_set_equality() {
        let mut form = Form::new("Sets");
        form.questions = vec![question(
            "q1",
            QuestionKind::Checkbox,
            Some(CorrectAnswer::Many(vec!["A".to_string(), "C".to_string()])),
            Some(5),
        )];

        // Order does not matter.
        let reordered = answers(&[(
            "q1",
            AnswerValue::Many(vec!["C".to_string(), "A".to_string()]),
        )]);
        assert_eq!(calculate_score(&form, &reordered).score, 5);

        // A subset scores zero.
        let subset = answers(&[("q1", AnswerValue::Many(vec!["A".to_string()]))]);
        assert_eq!(calculate_score(&form, &subset).score, 0);

        // Extra selections score zero.
        let superset = answers(&[(
            "q1",
            AnswerValue::Many(vec!["A".to_string(), "C".to_string(), "B".to_string()]),
        )]);
        assert_eq!(calculate_score(&form, &superset).score, 0);
    }

    #[test]
    fn test_multiple_choice_case_sensitive() {
        let mut form = Form::new("Case");
        form.questions = vec![question(
            "q1",
            QuestionKind::MultipleChoice,
            Some(CorrectAnswer::One("Paris".to_string())),
            Some(10),
        )];

        let wrong_case = answers(&[("q1", AnswerValue::Text("paris".to_string()))]);
        assert_eq!(calculate_score(&form, &wrong_case).score, 0);
    }

    #[test]
    fn test_unkeyed_and_unpointed_questions_skip() {
        let mut form = Form::new("Partially keyed");
        form.questions = vec![
            // No key: contributes nothing to max score.
            question("q1", QuestionKind::MultipleChoice, None, Some(10)),
            // No points: contributes nothing either.
            question(
                "q2",
                QuestionKind::Checkbox,
                Some(CorrectAnswer::Many(vec!["A".to_string()])),
                None,
            ),
            // Text questions never score, stray key or not.
            question(
                "q3",
                QuestionKind::Text,
                Some(CorrectAnswer::One("secret".to_string())),
                Some(10),
            ),
            question(
                "q4",
                QuestionKind::MultipleChoice,
                Some(CorrectAnswer::One("Yes".to_string())),
                Some(3),
            ),
        ];

        let all = answers(&[
            ("q3", AnswerValue::Text("secret".to_string())),
            ("q4", AnswerValue::Text("Yes".to_string())),
        ]);
        let result = calculate_score(&form, &all);
        assert_eq!(result.max_score, 3);
        assert_eq!(result.score, 3);
    }

    #[test]
    fn test_percentage_zero_when_nothing_scoreable() {
        let form = Form::new("Plain survey");
        let result = calculate_score(&form, &HashMap::new());
        assert_eq!(result.max_score, 0);
        assert_eq!(result.percentage(), 0);
        // 0 >= 70 is false; an unscoreable form never "passes".
        assert!(!result.passed(&form));
    }

    #[test]
    fn test_grade_response_freezes_scores() {
        let form = quiz_form();
        let mut response = FormResponse::new(form.id.clone());
        response
            .answers
            .insert("q1".to_string(), AnswerValue::Text("Paris".to_string()));

        grade_response(&form, &mut response);
        assert_eq!(response.preliminary_score, Some(10));
        assert_eq!(response.max_score, Some(25));
        assert_eq!(response.final_score, None);
    }
}
