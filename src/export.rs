use crate::models::{AnswerValue, Form, FormMode, FormResponse};

/// Renders a response set as CSV: one header row, one row per
/// response, every cell double-quoted. Questionnaire forms get the
/// grading columns between the date and the per-question columns.
/// An empty response list yields an empty string.
pub fn export_to_csv(form: &Form, responses: &[FormResponse]) -> String {
    if responses.is_empty() {
        return String::new();
    }

    let questionnaire = form.mode == FormMode::Questionnaire;

    let mut header: Vec<String> = vec!["Submission Date".to_string()];
    if questionnaire {
        header.push("Student Name".to_string());
        header.push("Preliminary Score".to_string());
        header.push("Final Score".to_string());
        header.push("Max Score".to_string());
    }
    header.extend(form.questions.iter().map(|q| q.title.clone()));

    let mut lines = Vec::with_capacity(responses.len() + 1);
    lines.push(csv_line(&header));

    for response in responses {
        let mut row: Vec<String> = vec![response.submitted_at.clone()];
        if questionnaire {
            row.push(response.student_name.clone().unwrap_or_default());
            row.push(opt_score(response.preliminary_score));
            row.push(opt_score(response.final_score));
            row.push(opt_score(response.max_score));
        }
        for question in &form.questions {
            row.push(answer_cell(response.answers.get(&question.id)));
        }
        lines.push(csv_line(&row));
    }

    lines.join("\n")
}

fn opt_score(score: Option<i64>) -> String {
    score.map(|s| s.to_string()).unwrap_or_default()
}

fn answer_cell(answer: Option<&AnswerValue>) -> String {
    match answer {
        Some(AnswerValue::Text(s)) => s.clone(),
        // Multi-value answers share one cell, comma-space separated.
        Some(AnswerValue::Many(v)) => v.join(", "),
        None => String::new(),
    }
}

fn csv_line(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}
