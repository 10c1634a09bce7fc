//! Max-reductions across the emulated lanes of a worker group.
//!
//! A worker group is `width` lanes split into sub-groups of [`SUB_GROUP`].
//! Lanes first combine inside their sub-group, each sub-group leaves one
//! partial in a shared buffer, then a single sub-group folds that buffer.
//! Only non-negative values are reduced here, so idle lanes hold `0.`.

use std::iter::zip;

/// Lanes per sub-group.
pub const SUB_GROUP: usize = 32;
/// Widest worker group: the shared buffer must fit in one sub-group.
pub const MAX_GROUP_WIDTH: usize = SUB_GROUP * SUB_GROUP;

/// Butterfly exchange; afterwards every lane holds the sub-group maximum.
pub(crate) fn sub_group_max(lanes: &mut [f32; SUB_GROUP]) {
    let mut offset = SUB_GROUP / 2;
    while offset > 0 {
        let peers = *lanes;
        for (i, lane) in lanes.iter_mut().enumerate() {
            *lane = lane.max(peers[i ^ offset]);
        }
        offset /= 2;
    }
}

/// Folds one value per lane into the group maximum, as seen by lane 0.
pub(crate) fn group_max(lanes: &[f32]) -> f32 {
    assert!(lanes.len() <= MAX_GROUP_WIDTH);

    let mut shared = [0.; SUB_GROUP];
    for (slot, sub) in zip(&mut shared, lanes.chunks(SUB_GROUP)) {
        let mut regs = [0.; SUB_GROUP];
        regs[..sub.len()].copy_from_slice(sub);
        sub_group_max(&mut regs);
        *slot = regs[0];
    }
    // all partials are published before the final fold
    sub_group_max(&mut shared);
    shared[0]
}

#[test]
fn test_sub_group_max() {
    let mut lanes = [0.; SUB_GROUP];
    for (i, x) in lanes.iter_mut().enumerate() {
        *x = ((i * 7) % SUB_GROUP) as f32;
    }
    sub_group_max(&mut lanes);
    assert!(lanes.iter().all(|&x| x == (SUB_GROUP - 1) as f32));
}

#[test]
fn test_group_max() {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    for width in [1, 5, 32, 33, 100, 1000, MAX_GROUP_WIDTH] {
        let mut lanes = vec![0.0f32; width];
        rng.fill(&mut lanes[..]);
        let expected = lanes.iter().fold(0.0f32, |m, &x| m.max(x));
        assert_eq!(group_max(&lanes), expected, "width = {width}");
    }
    assert_eq!(group_max(&[]), 0.);
}
