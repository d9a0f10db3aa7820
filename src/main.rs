use anyhow::{bail, Context, Result};
use log::info;

use kuest::storage::{FormStore, HybridStore};
use kuest::{export_to_csv, grade_response, FormResponse};

/// Small operational harness around the storage façade: list what the
/// configured backend can see, fetch or share a single form, export a
/// form's responses as CSV. The web frontend goes through the same
/// library calls.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let store = HybridStore::from_env();

    match args.first().map(String::as_str) {
        Some("list") => {
            let forms = store.list_forms(None).await?;
            info!("Found {} forms", forms.len());
            for form in forms {
                println!("{}  {}  ({:?})", form.id, form.title, form.mode);
            }
        }
        Some("get") => {
            let id = args.get(1).context("usage: kuest get <form-id>")?;
            match store.get_form(id).await? {
                Some(form) => println!("{}", serde_json::to_string_pretty(&form)?),
                None => bail!("Form {} not found", id),
            }
        }
        Some("share") => {
            let id = args.get(1).context("usage: kuest share <form-id>")?;
            let form = store
                .get_form(id)
                .await?
                .with_context(|| format!("Form {} not found", id))?;
            let token = kuest::encode_form(&form).context("Form could not be encoded")?;
            println!("{}", token);
        }
        Some("submit") => {
            // Grade a response read from stdin as JSON and persist it.
            let id = args.get(1).context("usage: kuest submit <form-id> < answers.json")?;
            let form = store
                .get_form(id)
                .await?
                .with_context(|| format!("Form {} not found", id))?;

            let text = std::io::read_to_string(std::io::stdin())?;
            let mut response = FormResponse::new(form.id.clone());
            response.answers = serde_json::from_str(&text).context("Answers must be JSON")?;

            grade_response(&form, &mut response);
            let saved = store.save_response(&response, None).await?;
            println!(
                "Saved response {} (score {:?}/{:?})",
                saved.id, saved.preliminary_score, saved.max_score
            );
        }
        Some("export-csv") => {
            let id = args.get(1).context("usage: kuest export-csv <form-id>")?;
            let form = store
                .get_form(id)
                .await?
                .with_context(|| format!("Form {} not found", id))?;
            let responses = store.list_responses(Some(id), None).await?;
            print!("{}", export_to_csv(&form, &responses));
        }
        _ => {
            eprintln!("usage: kuest <list | get <id> | share <id> | submit <id> | export-csv <id>>");
            std::process::exit(2);
        }
    }

    Ok(())
}
