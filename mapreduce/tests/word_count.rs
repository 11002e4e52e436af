//! The canonical word count, checked against a single-threaded reference:
//! whatever the workers interleave, the output multiset must match.

use std::collections::HashMap;

use mapreduce::{Client, Job, MapEmitter, ReduceEmitter, Stage};

struct WordCount;

impl Client for WordCount {
    type K1 = usize;
    type V1 = String;
    type K2 = String;
    type V2 = ();
    type K3 = String;
    type V3 = usize;

    fn map(&self, _doc: &usize, text: &String, out: &mut MapEmitter<'_, String, ()>) {
        for word in text.split_whitespace() {
            out.emit(word.to_string(), ());
        }
    }

    fn reduce(&self, group: Vec<(String, ())>, out: &mut ReduceEmitter<'_, String, usize>) {
        let count = group.len();
        let Some((word, ())) = group.into_iter().next() else {
            panic!("reduce got an empty group");
        };
        out.emit(word, count);
    }
}

fn reference(input: &[(usize, String)]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (_, text) in input {
        for word in text.split_whitespace() {
            *counts.entry(word.to_string()).or_default() += 1;
        }
    }
    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort();
    sorted
}

fn documents() -> Vec<(usize, String)> {
    vec![
        (0, "the quick brown fox jumps over the lazy dog".to_string()),
        (1, "the dog barks at the quick fox".to_string()),
        (2, "lazy summer days drift over the quiet river".to_string()),
    ]
}

#[test]
fn counts_match_the_reference() {
    let _ = env_logger::builder().is_test(true).try_init();
    let input = documents();
    let expected = reference(&input);

    let job = Job::start(WordCount, input, 4);
    job.wait();
    let finished = job.state();
    assert_eq!(finished.stage, Stage::Reduce);
    assert_eq!(finished.percentage, 100.0);

    let mut output = job.close();
    output.sort();
    assert_eq!(output, expected);
}

#[test]
fn one_distinct_output_per_key_group() {
    let input = documents();
    let expected_groups = reference(&input).len();
    let output = Job::start(WordCount, input, 3).close();
    assert_eq!(output.len(), expected_groups);
}

#[test]
fn a_single_worker_agrees_with_many() {
    let input = documents();
    let mut alone = Job::start(WordCount, input.clone(), 1).close();
    let mut crowd = Job::start(WordCount, input, 8).close();
    alone.sort();
    crowd.sort();
    assert_eq!(alone, crowd);
}

#[test]
fn more_workers_than_inputs() {
    let input = vec![(0, "just one line".to_string())];
    let expected = reference(&input);
    let mut output = Job::start(WordCount, input, 6).close();
    output.sort();
    assert_eq!(output, expected);
}

#[test]
fn empty_input_still_reaches_reduce() {
    let job = Job::start(WordCount, Vec::new(), 3);
    job.wait();
    let state = job.state();
    assert_eq!(state.stage, Stage::Reduce);
    assert_eq!(state.percentage, 0.0);
    assert!(job.close().is_empty());
}

#[test]
fn mappers_that_emit_nothing_still_finish() {
    let input = vec![(0, "   ".to_string()), (1, String::new()), (2, "\t\n".to_string())];
    let job = Job::start(WordCount, input, 4);
    assert!(job.close().is_empty());
}

#[test]
fn wait_is_idempotent() {
    let job = Job::start(WordCount, documents(), 2);
    job.wait();
    job.wait();
    job.wait();
    assert!(!job.close().is_empty());
}
