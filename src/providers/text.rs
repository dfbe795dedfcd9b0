/// String transformation provider
use crate::registry::{Operation, Provider};
use crate::value::args;
use crate::{DefaultKind, Value};

pub const PROVIDER_ID: &str = "text";

#[derive(Debug, Default, Clone, Copy)]
pub struct Text;

impl Provider for Text {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn operations(&self) -> Vec<Operation> {
        vec![
            transform("reverse", "Reverses a string. Args: (text)", |s| {
                s.chars().rev().collect()
            }),
            transform("uppercase", "Converts string to uppercase. Args: (text)", |s| {
                s.to_uppercase()
            }),
            transform("lowercase", "Converts string to lowercase. Args: (text)", |s| {
                s.to_lowercase()
            }),
            transform("remove_spaces", "Removes all whitespace. Args: (text)", |s| {
                s.split_whitespace().collect()
            }),
            // 0 is a valid count, so the default is -1
            Operation::new("count_words", PROVIDER_ID, |a: &[Value]| {
                let text = args::text(a, 0, "text")?;
                Ok(Value::Integer(text.split_whitespace().count() as i64))
            })
            .with_description("Counts words in string. Args: (text)")
            .with_default(DefaultKind::SentinelCount),
        ]
    }
}

fn transform<F>(name: &'static str, description: &str, f: F) -> Operation
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    Operation::new(name, PROVIDER_ID, move |a: &[Value]| {
        Ok(Value::Text(f(args::text(a, 0, "text")?)))
    })
    .with_description(description)
    .with_default(DefaultKind::UnchangedInput)
}
