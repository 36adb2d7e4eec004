mod common;

use common::{many_departments, offline_router, people};
use datask::intent::ANALYSIS_KEYWORDS;
use datask::{Dataset, Intent, Session};
use polars::prelude::df;

#[test]
fn test_scalar_lookup() {
    let answer = offline_router().answer(&people(), "What is the age of Arun");
    assert_eq!(answer, "arun's age: 25");
}

#[test]
fn test_scalar_returns_literal_value_not_statistic() {
    let router = offline_router();
    let ds = people();
    assert_eq!(router.answer(&ds, "salary of ravi"), "ravi's salary: 90000");
    // arun has two rows; the first one is used
    assert_eq!(router.answer(&ds, "age of arun"), "arun's age: 25");
}

#[test]
fn test_name_containing_a_verb_is_a_plain_lookup() {
    let df = df!(
        "name" => ["jasmine", "jasmine", "maxwell"],
        "age" => [30i64, 20, 44]
    )
    .unwrap();
    let ds = Dataset::from_frame(df).unwrap();
    let router = offline_router();
    assert_eq!(
        router.answer(&ds, "what is the age of jasmine"),
        "jasmine's age: 30"
    );
    assert_eq!(router.answer(&ds, "age of maxwell"), "maxwell's age: 44");
    assert_eq!(
        router.answer(&ds, "min age of jasmine"),
        "jasmine's min age: 20"
    );
}

#[test]
fn test_dataset_wide_average() {
    let answer = offline_router().answer(&people(), "average salary of team");
    assert_eq!(answer, "Average salary: 58400.00");
}

#[test]
fn test_average_is_arithmetic_mean() {
    let ds = people();
    let ages = ds.numeric_values("age").unwrap();
    let values: Vec<f64> = ages.into_iter().flatten().collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let answer = offline_router().answer(&ds, "mean age");
    assert_eq!(answer, format!("Average age: {:.2}", mean));
}

#[test]
fn test_other_aggregates() {
    let router = offline_router();
    let ds = people();
    assert_eq!(router.answer(&ds, "maximum salary"), "Max salary: 90000");
    assert_eq!(router.answer(&ds, "minimum age"), "Min age: 25");
    assert_eq!(router.answer(&ds, "total salary"), "Sum of salary: 292000");
    assert_eq!(
        router.answer(&ds, "count department"),
        "Count of department: 5 values (3 unique)"
    );
}

#[test]
fn test_entity_scoped_average() {
    let router = offline_router();
    let ds = people();
    assert_eq!(
        router.answer(&ds, "average salary of arun"),
        "arun's average salary: 51000.00"
    );
    assert_eq!(
        router.answer(&ds, "average salary of neha"),
        "neha has only one record: salary = 60000 (average not applicable for a single record)"
    );
}

#[test]
fn test_list_enumerates_small_columns() {
    let answer = offline_router().answer(&people(), "list department");
    assert_eq!(answer, "department: hr, it, sales");
}

#[test]
fn test_list_over_twenty_reports_count() {
    let answer = offline_router().answer(&many_departments(), "list department");
    assert_eq!(answer, "department: 25 unique values");
}

#[test]
fn test_multi_entity_lookup() {
    let answer = offline_router().answer(&people(), "salary of neha and ravi");
    assert_eq!(answer, "neha's salary: 60000\nravi's salary: 90000");
}

#[test]
fn test_comparison_is_structured_payload() {
    let router = offline_router();
    let ds = people();
    let question = "compare arun and neha";
    assert_eq!(
        router.classify(&ds, question).intent,
        Intent::DataRetrievalComparison
    );

    let answer = router.answer(&ds, question);
    let payload: serde_json::Value = serde_json::from_str(&answer).expect("comparison is JSON");
    assert_eq!(payload["kind"], "comparison");
    assert_eq!(payload["entities"], serde_json::json!(["arun", "neha"]));
    assert_eq!(payload["columns"][0]["column"], "age");
    assert_eq!(payload["columns"][0]["values"], serde_json::json!([25.0, 30.0]));
    assert_eq!(payload["columns"][1]["column"], "salary");
}

#[test]
fn test_trend_question_is_analysis() {
    let router = offline_router();
    let ds = people();
    let question = "what is the trend in age";
    assert_eq!(router.classify(&ds, question).intent, Intent::Analysis);
    let answer = router.answer(&ds, question);
    assert!(answer.starts_with("Summary (generated locally)"));
}

#[test]
fn test_analysis_keywords_always_win_over_retrieval_words() {
    let router = offline_router();
    let ds = people();
    for keyword in ANALYSIS_KEYWORDS {
        let question = format!("average salary of arun {}", keyword);
        assert_eq!(
            router.classify(&ds, &question).intent,
            Intent::Analysis,
            "question: {}",
            question
        );
    }
}

#[test]
fn test_unknown_entity_is_recovered() {
    let answer = offline_router().answer(&people(), "what is the age of jd master");
    assert_eq!(
        answer,
        "No records found for 'jd master'. Available entities: arun, neha, ravi, meena"
    );
}

#[test]
fn test_unknown_column_falls_through_to_analysis() {
    let answer = offline_router().answer(&people(), "what is the height of arun");
    assert!(answer.starts_with("Summary (generated locally)"));
    assert!(answer.contains("5 rows and 4 columns"));
}

#[test]
fn test_session_transcript() {
    let router = offline_router();
    let mut session = Session::new(people());
    session.ask(&router, "age of neha");
    session.ask(&router, "list department");
    let entries = session.transcript().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].answer, "neha's age: 30");
    assert_eq!(entries[1].question, "list department");
}
