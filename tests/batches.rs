// Particle batch lifecycle against an in-memory host.

use std::collections::HashSet;

use envelope_card::CardConfig;
use envelope_card::celebration::{LiveBatch, Particle, ParticleHost};
use envelope_card::error::{CardError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Default)]
struct MemoryHost {
    next: u32,
    attached: HashSet<u32>,
    fail_after: Option<u32>,
}

impl ParticleHost for MemoryHost {
    type Node = u32;

    fn attach(&mut self, _particle: &Particle) -> Result<u32> {
        if self.fail_after == Some(self.next) {
            return Err(CardError::Dom("appendChild failed".into()));
        }
        let id = self.next;
        self.next += 1;
        self.attached.insert(id);
        Ok(id)
    }

    fn detach(&mut self, node: u32) {
        assert!(self.attached.remove(&node), "node {node} detached twice");
    }
}

#[test]
fn every_celebration_batch_cleans_up_after_itself() {
    let cfg = CardConfig::default();
    let mut host = MemoryHost::default();
    let mut rng = StdRng::seed_from_u64(99);

    let mut live = Vec::new();
    for spec in &cfg.celebration.batches {
        let batch = LiveBatch::launch(spec, &mut host, &mut rng).unwrap();
        assert_eq!(batch.len(), spec.count);
        assert_eq!(batch.lifetime_ms(), spec.lifetime_ms);
        live.push(batch);
    }
    assert_eq!(host.attached.len(), 60 + 20 + 15);

    // retire in lifetime order, the way the timers fire
    live.sort_by_key(|b| b.lifetime_ms());
    let expected_left = [60 + 20, 20, 0];
    for (batch, left) in live.into_iter().zip(expected_left) {
        batch.retire(&mut host);
        assert_eq!(host.attached.len(), left);
    }
}

#[test]
fn failed_launch_leaves_nothing_behind() {
    let cfg = CardConfig::default();
    let mut host = MemoryHost { fail_after: Some(5), ..Default::default() };
    let mut rng = StdRng::seed_from_u64(1);
    let res = LiveBatch::launch(&cfg.celebration.batches[0], &mut host, &mut rng);
    assert!(res.is_err());
    assert!(host.attached.is_empty());
}

#[test]
fn intro_photos_launch_as_one_batch() {
    let cfg = CardConfig::default();
    let mut host = MemoryHost::default();
    let mut rng = StdRng::seed_from_u64(5);
    let batch = LiveBatch::launch(&cfg.intro.batch, &mut host, &mut rng).unwrap();
    assert_eq!(batch.len(), 8);
    assert_eq!(batch.lifetime_ms(), 4000);
    batch.retire(&mut host);
    assert!(host.attached.is_empty());
}
