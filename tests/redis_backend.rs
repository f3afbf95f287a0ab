//! Redis 后端集成测试
//!
//! 需要本地可用的 Redis 实例（默认 redis://127.0.0.1:6379，
//! 可通过 QLIMITER_TEST_REDIS_URL 覆盖），因此全部标记为 `#[ignore]`：
//!
//! ```text
//! cargo test --test redis_backend -- --ignored
//! ```

use qlimiter::prelude::*;
use qlimiter::redis_store::{RedisConfig, RedisSlidingWindowLog};
use qlimiter::LocalSlidingWindowLog;
use std::sync::Arc;

fn redis_url() -> String {
    std::env::var("QLIMITER_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

async fn redis_store() -> RedisSlidingWindowLog {
    let config = RedisConfig {
        url: redis_url(),
        ..RedisConfig::default()
    };
    let conn = config.connect().await.expect("需要可用的Redis实例");
    RedisSlidingWindowLog::new(conn, "qlimiter-test")
}

/// 每个测试使用独立的 key，避免测试间状态串扰
fn unique_key(prefix: &str) -> String {
    format!("{}:{}", prefix, uuid::Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore]
async fn basic_scenario_matches_spec_sequence() {
    let store = redis_store().await;
    let key = unique_key("basic");
    let base = qlimiter::clock::now_millis();

    // freq=3, interval=1000ms：相对时间戳平移到当前时刻，
    // 避免键过期逻辑受远古时间戳影响
    let sequence = [
        (0u64, true),
        (100, true),
        (200, true),
        (300, false),
        (1500, true),
        (1600, true),
        (1700, true),
        (1800, false),
    ];

    for (offset, expected) in sequence {
        let allowed = store
            .try_admit_at(&key, 3, 1000, 5, base + offset)
            .await
            .unwrap();
        assert_eq!(allowed, expected, "offset={}", offset);
    }

    store.reset(&key).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn colliding_millisecond_admissions_stay_distinct() {
    let store = redis_store().await;
    let key = unique_key("collide");
    let now = qlimiter::clock::now_millis();

    // freq=1：同一毫秒的两次请求，只放行一次
    let first = store.try_admit_at(&key, 1, 1000, 1, now).await.unwrap();
    let second = store.try_admit_at(&key, 1, 1000, 1, now).await.unwrap();
    assert!(first);
    assert!(!second);
    // 消歧后缀保证放行的记录没有与被拒绝的请求塌缩
    assert_eq!(store.current_count(&key).await.unwrap(), 1);

    // freq=2：同一毫秒放行两次，必须产生两条独立记录
    let key2 = unique_key("collide2");
    assert!(store.try_admit_at(&key2, 2, 1000, 3, now).await.unwrap());
    assert!(store.try_admit_at(&key2, 2, 1000, 3, now).await.unwrap());
    assert_eq!(store.current_count(&key2).await.unwrap(), 2);

    store.reset(&key).await.unwrap();
    store.reset(&key2).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn local_and_redis_backends_agree() {
    let redis = redis_store().await;
    let local = LocalSlidingWindowLog::new();
    let key = unique_key("parity");
    let base = qlimiter::clock::now_millis();

    // 同一时间戳序列在两个后端上必须产生相同的放行/拒绝序列
    let offsets = [0u64, 50, 100, 150, 900, 1001, 1050, 1200, 2500, 2501, 2502, 2503];

    for offset in offsets {
        let now = base + offset;
        let from_local = local.try_admit_at(&key, 3, 1000, 5, now).await.unwrap();
        let from_redis = redis.try_admit_at(&key, 3, 1000, 5, now).await.unwrap();
        assert_eq!(from_local, from_redis, "offset={}", offset);
    }

    redis.reset(&key).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn registry_with_redis_backend() {
    let config = RedisConfig {
        url: redis_url(),
        ..RedisConfig::default()
    };
    let conn = config.connect().await.expect("需要可用的Redis实例");

    let settings = RegistrySettings {
        backend: Backend::Redis,
        freq: 2,
        interval_ms: 1000,
        capacity: 3,
        ..RegistrySettings::default()
    };
    let factory = ExecutorFactory::new()
        .with_redis(conn)
        .with_key_prefix("qlimiter-test");
    let registry = LimiterRegistry::new(settings, Arc::new(factory)).unwrap();

    let key = unique_key("registry");
    let limiter = registry.get_or_create(&key).unwrap();

    assert!(limiter.try_admit().await.unwrap());
    assert!(limiter.try_admit().await.unwrap());
    assert!(!limiter.try_admit().await.unwrap());

    limiter.reset().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn unreachable_redis_surfaces_storage_error() {
    // 不可达地址：连接阶段即失败，错误不被伪装成拒绝
    let config = RedisConfig {
        url: "redis://127.0.0.1:1".to_string(),
        connection_timeout: std::time::Duration::from_millis(500),
    };
    let result = config.connect().await;
    assert!(result.is_err());
}
