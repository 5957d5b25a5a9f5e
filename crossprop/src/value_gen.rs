use std::time::{SystemTime, UNIX_EPOCH};

use proptest::{
    collection::{btree_map, vec},
    prelude::*,
    strategy::ValueTree,
    test_runner::{Config, RngAlgorithm, TestRng, TestRunner},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shape of the generated values.
///
/// Depth counts container levels: with `max_depth == 0` only scalars are
/// produced, with `max_depth == 1` objects and arrays of scalars appear too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub max_depth: usize,
    pub max_collection_len: usize,
    /// Relative frequency of a scalar at each level that could hold a container.
    pub scalar_weight: u32,
    /// Relative frequency of an object or array at each such level.
    pub container_weight: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            max_depth: 1,
            max_collection_len: 4,
            scalar_weight: 1,
            container_weight: 1,
        }
    }
}

fn string_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        4 => "[a-zA-Z0-9]{0,10}",
        // quotes, backslashes and C0 controls are where escaping goes wrong
        2 => "[\\x00-\\x1f'\"\\\\ a-z]{0,8}",
        1 => "\\PC{0,6}",
    ]
    .boxed()
}

fn key_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        2 => "[0-9]{1,2}",
        3 => "[a-zA-Z_][a-zA-Z0-9_]{0,7}",
        1 => string_strategy(),
    ]
    .boxed()
}

fn integer_strategy() -> BoxedStrategy<Value> {
    prop_oneof![
        3 => (-100i64..100).prop_map(Value::from),
        1 => any::<i64>().prop_map(Value::from),
    ]
    .boxed()
}

fn scalar_strategy() -> BoxedStrategy<Value> {
    prop_oneof![
        1 => Just(Value::Null),
        2 => any::<bool>().prop_map(Value::Bool),
        3 => integer_strategy(),
        4 => string_strategy().prop_map(Value::String),
    ]
    .boxed()
}

fn value_at_depth(config: &GeneratorConfig, depth: usize) -> BoxedStrategy<Value> {
    if depth == 0 || config.container_weight == 0 {
        return scalar_strategy();
    }
    let inner = value_at_depth(config, depth - 1);
    let len = 0..=config.max_collection_len;
    let containers = prop_oneof![
        vec(inner.clone(), len.clone()).prop_map(Value::Array),
        btree_map(key_strategy(), inner, len)
            .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
    ];
    if config.scalar_weight == 0 {
        return containers.boxed();
    }
    prop_oneof![
        config.scalar_weight => scalar_strategy(),
        config.container_weight => containers,
    ]
    .boxed()
}

/// Strategy producing JSON values no deeper than `config.max_depth`.
pub fn value_strategy(config: &GeneratorConfig) -> BoxedStrategy<Value> {
    value_at_depth(config, config.max_depth)
}

/// Number of container levels in `value`; scalars are 0, `{}` and `[]` are 1.
pub fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(nesting_depth).max().unwrap_or(0),
        Value::Object(entries) => 1 + entries.values().map(nesting_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// A seed that differs between runs, for when the caller did not pick one.
pub fn fresh_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    // fold the high bits in, then scramble (splitmix64 finalizer)
    let mut x = (nanos as u64) ^ ((nanos >> 64) as u64);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

fn seeded_runner(seed: u64) -> TestRunner {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &bytes);
    TestRunner::new_with_rng(
        Config {
            failure_persistence: None,
            ..Config::default()
        },
        rng,
    )
}

/// Lazy, restartable sequence of generated values.
///
/// Every call to [`ValueStream::iter`] or [`ValueStream::trees`] starts over
/// from the seed, so two iterations over the same stream agree element-wise.
pub struct ValueStream {
    strategy: BoxedStrategy<Value>,
    seed: u64,
}

impl ValueStream {
    pub fn new(config: &GeneratorConfig, seed: u64) -> Self {
        ValueStream {
            strategy: value_strategy(config),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Value trees, for callers that want to shrink a failing value.
    pub fn trees(&self) -> ValueTrees<'_> {
        ValueTrees {
            strategy: &self.strategy,
            runner: seeded_runner(self.seed),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.trees().map(|tree| tree.current())
    }
}

pub struct ValueTrees<'a> {
    strategy: &'a BoxedStrategy<Value>,
    runner: TestRunner,
}

impl Iterator for ValueTrees<'_> {
    type Item = Box<dyn ValueTree<Value = Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.strategy.new_tree(&mut self.runner) {
            Ok(tree) => Some(tree),
            Err(reason) => {
                tracing::warn!("value generation stopped: {reason}");
                None
            }
        }
    }
}
