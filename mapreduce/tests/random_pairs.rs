//! Random inputs with heavy key collisions, several worker counts, all
//! checked against a sequential reference.

use std::collections::HashMap;

use mapreduce::{Client, Job, MapEmitter, ReduceEmitter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Histogram;

impl Client for Histogram {
    type K1 = u64;
    type V1 = Vec<u8>;
    type K2 = u8;
    type V2 = u64;
    type K3 = u8;
    type V3 = u64;

    fn map(&self, seed: &u64, bytes: &Vec<u8>, out: &mut MapEmitter<'_, u8, u64>) {
        for &b in bytes {
            out.emit(b % 23, seed.wrapping_add(u64::from(b)));
        }
    }

    fn reduce(&self, group: Vec<(u8, u64)>, out: &mut ReduceEmitter<'_, u8, u64>) {
        let key = group[0].0;
        let sum = group
            .into_iter()
            .map(|(_, v)| v)
            .fold(0u64, u64::wrapping_add);
        out.emit(key, sum);
    }
}

#[test]
fn random_inputs_match_sequential_reference() {
    let mut rng = StdRng::seed_from_u64(0xfeed);
    let input: Vec<(u64, Vec<u8>)> = (0..200)
        .map(|i| {
            let len = rng.random_range(0..40);
            (i, (0..len).map(|_| rng.random::<u8>()).collect())
        })
        .collect();

    let mut expected: HashMap<u8, u64> = HashMap::new();
    for (seed, bytes) in &input {
        for &b in bytes {
            let entry = expected.entry(b % 23).or_default();
            *entry = entry.wrapping_add(seed.wrapping_add(u64::from(b)));
        }
    }
    let mut expected: Vec<(u8, u64)> = expected.into_iter().collect();
    expected.sort();

    for workers in [1, 2, 7] {
        let mut output = Job::start(Histogram, input.clone(), workers).close();
        output.sort();
        assert_eq!(output, expected, "workers = {workers}");
    }
}
