//! Node shape classification.
//!
//! A node's shape is computed once at construction: what kind of node it is,
//! combined with what kind of children it carries. The renderer dispatches
//! on these bits instead of re-inspecting the node.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u8 {
        const ELEMENT = 1;
        const STATEFUL_COMPONENT = 1 << 1;
        const TEXT_CHILDREN = 1 << 2;
        const ARRAY_CHILDREN = 1 << 3;
        const SLOT_CHILDREN = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let shape = ShapeFlags::ELEMENT | ShapeFlags::TEXT_CHILDREN;
        assert!(shape.contains(ShapeFlags::ELEMENT));
        assert!(!shape.intersects(ShapeFlags::ARRAY_CHILDREN | ShapeFlags::STATEFUL_COMPONENT));
        assert_eq!(shape.bits(), 5);
    }
}
