use std::path::PathBuf;

use clap::Subcommand;
use momentum_core::challenge::{blank_set, Question, OPTIONS_PER_QUESTION};

use super::open_settings;

#[derive(Subcommand)]
pub enum QuizAction {
    /// Print the stored question set as JSON
    List {
        /// Print the blank editing template when nothing is stored
        #[arg(long)]
        template: bool,
    },
    /// Replace question <n>, or append it as the next one
    Set {
        /// Question number, starting at 1
        number: usize,
        /// Question text
        #[arg(long)]
        text: String,
        /// Four comma-separated answers
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        answers: Vec<String>,
        /// Number of the correct answer (1-4)
        #[arg(long)]
        correct: usize,
    },
    /// Replace the whole set from a JSON file
    Import {
        /// File with a JSON array of questions
        file: PathBuf,
    },
    /// Delete the stored question set
    Clear,
}

/// Put `question` at 1-based position `number`: replaces an existing entry
/// or appends right after the last one.
pub fn place_question(
    mut questions: Vec<Question>,
    number: usize,
    question: Question,
) -> Result<Vec<Question>, String> {
    if number == 0 || number > questions.len() + 1 {
        return Err(format!(
            "question number must be between 1 and {}",
            questions.len() + 1
        ));
    }
    if number <= questions.len() {
        questions[number - 1] = question;
    } else {
        questions.push(question);
    }
    Ok(questions)
}

pub fn run(action: QuizAction) -> Result<(), Box<dyn std::error::Error>> {
    let settings = open_settings()?;

    match action {
        QuizAction::List { template } => {
            let mut questions = settings.questions();
            if questions.is_empty() && template {
                questions = blank_set();
            }
            println!("{}", serde_json::to_string_pretty(&questions)?);
        }
        QuizAction::Set {
            number,
            text,
            answers,
            correct,
        } => {
            if correct == 0 || correct > OPTIONS_PER_QUESTION {
                return Err(format!("--correct must be between 1 and {OPTIONS_PER_QUESTION}").into());
            }
            let answers = answers.into_iter().map(|a| a.trim().to_string()).collect();
            let question = Question::new(number as u32, text.trim(), answers, correct - 1);
            let questions = place_question(settings.questions(), number, question)?;
            settings.set_questions(&questions)?;
            println!("{}", serde_json::to_string_pretty(&settings.questions())?);
        }
        QuizAction::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let questions: Vec<Question> = serde_json::from_str(&raw)?;
            settings.set_questions(&questions)?;
            println!("imported {} questions", questions.len());
        }
        QuizAction::Clear => {
            settings.clear_questions()?;
            println!("question set cleared");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(prompt: &str) -> Question {
        Question::new(0, prompt, vec!["a".into(), "b".into(), "c".into(), "d".into()], 0)
    }

    #[test]
    fn replaces_existing_question() {
        let placed = place_question(vec![q("one"), q("two")], 2, q("new")).unwrap();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].prompt, "new");
    }

    #[test]
    fn appends_next_question() {
        let placed = place_question(vec![q("one")], 2, q("two")).unwrap();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].prompt, "two");
    }

    #[test]
    fn rejects_gaps_and_zero() {
        assert!(place_question(vec![q("one")], 3, q("x")).is_err());
        assert!(place_question(Vec::new(), 0, q("x")).is_err());
    }
}
