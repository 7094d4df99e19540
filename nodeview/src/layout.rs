//! Socket stacking helpers used by node allocation.

/// Vertical offsets for `count` sockets spread over `height`.
///
/// Two or more sockets are spaced `height / (count - 1)` apart starting at 0;
/// a single socket sits at `height / 2`. When there are more sockets than
/// pixels the count is clamped to the height and the surplus sockets share
/// the last slot.
pub fn distribute(count: usize, height: f32) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    let height = height.max(0.0);
    if count == 1 {
        return vec![height / 2.0];
    }

    let slots = if count as f32 > height {
        (height as usize).max(1)
    } else {
        count
    };
    if slots == 1 {
        return vec![height / 2.0; count];
    }

    let step = height / (slots - 1) as f32;
    (0..count)
        .map(|i| i.min(slots - 1) as f32 * step)
        .collect()
}

/// Height needed to stack items of the given heights.
pub fn stack_height(heights: impl IntoIterator<Item = f32>) -> f32 {
    heights.into_iter().sum()
}
