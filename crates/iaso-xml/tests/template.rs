//! Skeleton building and caching tests.

use iaso_model::{FormVersion, Question, QuestionType};
use iaso_xml::{TemplateCache, build_skeleton};

fn question(name: &str, qtype: QuestionType) -> Question {
    Question {
        name: name.to_string(),
        qtype,
        label: None,
        required: false,
        constraint: None,
        calculation: None,
    }
}

fn version(id: &str, questions: Vec<Question>) -> FormVersion {
    FormVersion {
        version_id: id.to_string(),
        questions,
        choices: vec![],
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

#[test]
fn skeleton_keeps_question_order_and_drops_unknown_columns() {
    let v = version(
        "3",
        vec![
            question("first", QuestionType::Text),
            question("second", QuestionType::Integer),
            question("third", QuestionType::Text),
        ],
    );
    // File column order differs and carries an extra column.
    let skeleton = build_skeleton("42", &v, &columns(&["third", "extra", "first"]));

    assert_eq!(skeleton.fields, vec!["first", "third"]);
    assert_eq!(skeleton.form_id, "42");
    assert_eq!(skeleton.version_id, "3");
    assert_eq!(skeleton.group, None);
}

#[test]
fn skeleton_excludes_structural_questions() {
    let v = version(
        "1",
        vec![
            question("household", QuestionType::BeginGroup),
            question("name", QuestionType::Text),
            question("hint", QuestionType::Note),
            question("household_end", QuestionType::EndGroup),
        ],
    );
    let skeleton = build_skeleton("42", &v, &columns(&["household", "name", "hint"]));

    assert_eq!(skeleton.fields, vec!["name"]);
    assert_eq!(skeleton.group.as_deref(), Some("household"));
}

#[test]
fn cache_returns_identical_skeleton_for_same_version() {
    let v = version("7", vec![question("name", QuestionType::Text)]);
    let cols = columns(&["name"]);

    let mut cache = TemplateCache::new();
    let first = cache.get_or_build("42", &v, &cols);
    let second = cache.get_or_build("42", &v, &cols);

    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_builds_distinct_skeletons_per_version() {
    let v1 = version("1", vec![question("name", QuestionType::Text)]);
    let v2 = version(
        "2",
        vec![
            question("name", QuestionType::Text),
            question("age", QuestionType::Integer),
        ],
    );
    let cols = columns(&["name", "age"]);

    let mut cache = TemplateCache::new();
    let first = cache.get_or_build("42", &v1, &cols);
    let second = cache.get_or_build("42", &v2, &cols);

    assert_ne!(first, second);
    assert_eq!(cache.len(), 2);
    assert_eq!(second.fields, vec!["name", "age"]);
}
