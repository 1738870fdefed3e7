//! Prompt templates for model-assisted categorization

use super::rules::LanguageFamily;
use super::Category;

/// Which definitions a prompt offers the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryPrompt {
    /// Command lines and shell sessions
    Shell,
    /// JSON, XML, and YAML documents
    JsonLike,
    /// Driver-language source code
    DriverCode,
    /// Plain text and anything without a declared language
    Text,
}

impl CategoryPrompt {
    /// Pick the prompt for a language family
    ///
    /// JavaScript and text examples on primary-language projects read as
    /// driver code; elsewhere they are treated as text.
    pub fn for_family(family: LanguageFamily, primary_language_project: bool) -> Self {
        match family {
            LanguageFamily::Shell => Self::Shell,
            LanguageFamily::JsonLike => Self::JsonLike,
            LanguageFamily::CompiledDriver => Self::DriverCode,
            LanguageFamily::JavaScript | LanguageFamily::Text if primary_language_project => {
                Self::DriverCode
            }
            LanguageFamily::JavaScript | LanguageFamily::Text | LanguageFamily::Undefined => {
                Self::Text
            }
        }
    }

    /// Categories this prompt lets the model choose from
    pub fn choices(self) -> &'static [Category] {
        match self {
            Self::Shell => &[
                Category::NonMongoCommand,
                Category::SyntaxExample,
                Category::ExampleReturnObject,
                Category::ExampleConfigurationObject,
            ],
            Self::JsonLike => &[
                Category::ExampleReturnObject,
                Category::ExampleConfigurationObject,
            ],
            Self::DriverCode => &[Category::SyntaxExample, Category::UsageExample],
            Self::Text => &[
                Category::NonMongoCommand,
                Category::SyntaxExample,
                Category::ExampleReturnObject,
                Category::ExampleConfigurationObject,
                Category::UsageExample,
            ],
        }
    }

    /// Render the full prompt for one example
    pub fn generate(self, code: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str("Use the following pieces of context to answer the question at the end.\n\n");
        prompt.push_str(&format!("Context:\n```\n{}\n```\n\n", code));

        prompt.push_str("Question: I need to sort code examples into one of these categories:\n");
        for category in self.choices() {
            prompt.push_str(&format!("- {}\n", category));
        }

        prompt.push_str("\nUse these definitions for each category to help categorize the code example:\n");
        for category in self.choices() {
            prompt.push_str(&format!("{}: {}\n", category, definition(*category)));
        }

        prompt.push_str(ANSWER_INSTRUCTIONS);
        prompt
    }
}

const ANSWER_INSTRUCTIONS: &str = "\nUsing these definitions, which category applies to this code example? \
Don't list an explanation, only list the category name.";

fn definition(category: Category) -> &'static str {
    match category {
        Category::NonMongoCommand => {
            "One line or only a few lines of code that demonstrate popular command-line commands, \
such as 'docker ', 'go run', 'jq ', 'vi ', 'mkdir ', 'npm ', 'cd ' or other common command-line \
invocations. If it starts with 'atlas ' or 'mongosh ' it does not belong in this category."
        }
        Category::SyntaxExample => {
            "One line or only a few lines of code that show the syntax of a command or a method call, \
but not the initialization of arguments or parameters passed into it. It demonstrates syntax but \
is not usable code on its own."
        }
        Category::ExampleReturnObject => {
            "An example object, typically represented in JSON, enumerating fields in a return object \
and their types. Typically includes an '_id' field and represents one or more example documents. \
Output logged to a console, such as status or error messages, also belongs here."
        }
        Category::ExampleConfigurationObject => {
            "An example object, typically represented in JSON or YAML, enumerating required and \
optional parameters and their types. If it shows an '_id' field, it is a return object, not a \
configuration object."
        }
        Category::UsageExample => {
            "A longer code snippet that establishes parameters, performs basic setup, and includes the \
larger context to demonstrate how to accomplish a task. If an example shows parameters but does \
not initialize them, it is a syntax example."
        }
        Category::Uncategorized => "None of the other categories apply.",
    }
}
