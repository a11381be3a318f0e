//! Per-frame draw lists, one per render category.

use std::ops::{Index, IndexMut};

use glam::Vec3;

use crate::world::{MaterialId, SegmentId, SubsectorId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawListKind {
    PlainWalls,
    PlainFlats,
    MaskedWalls,
    MaskedFlats,
    /// Masked walls that need a polygon offset to win against coplanar
    /// geometry (polyobject mid textures).
    MaskedWallsOffset,
    Models,
    Translucent,
    /// Translucent surfaces sitting on portal lines.
    TranslucentBorder,
}

impl DrawListKind {
    pub const COUNT: usize = 8;

    pub const ALL: [DrawListKind; Self::COUNT] = [
        DrawListKind::PlainWalls,
        DrawListKind::PlainFlats,
        DrawListKind::MaskedWalls,
        DrawListKind::MaskedFlats,
        DrawListKind::MaskedWallsOffset,
        DrawListKind::Models,
        DrawListKind::Translucent,
        DrawListKind::TranslucentBorder,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WallPart {
    Upper,
    Middle,
    Lower,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Wall {
        seg: SegmentId,
        part: WallPart,
        bottom: f32,
        top: f32,
    },
    Flat {
        subsector: SubsectorId,
        ceiling: bool,
        z: f32,
    },
    /// Index into the scene's actor slice.
    Sprite { actor: usize },
    Model { actor: usize },
    Decal { seg: SegmentId, index: usize },
}

/// One renderable thing plus what is needed to draw it.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub prim: Primitive,
    pub material: MaterialId,
    pub light: f32,
    pub alpha: f32,
    /// World-space centre, used for distance sorting.
    pub origin: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct DrawList {
    items: Vec<DrawItem>,
}

impl DrawList {
    #[inline]
    pub fn push(&mut self, item: DrawItem) {
        self.items.push(item);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawItem> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Group by material to cut down on texture switches.
    pub fn sort_by_material(&mut self) {
        self.items.sort_by_key(|it| it.material);
    }

    /// Farthest first. Stable, so equal distances keep insertion order.
    pub fn sort_back_to_front(&mut self, eye: Vec3) {
        self.items.sort_by(|a, b| {
            eye.distance_squared(b.origin)
                .total_cmp(&eye.distance_squared(a.origin))
        });
    }

    pub fn sort_front_to_back(&mut self, eye: Vec3) {
        self.items.sort_by(|a, b| {
            eye.distance_squared(a.origin)
                .total_cmp(&eye.distance_squared(b.origin))
        });
    }
}

impl<'a> IntoIterator for &'a DrawList {
    type Item = &'a DrawItem;
    type IntoIter = std::slice::Iter<'a, DrawItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// All category lists of one scene build.
#[derive(Clone, Debug, Default)]
pub struct DrawLists {
    lists: [DrawList; DrawListKind::COUNT],
}

impl DrawLists {
    pub fn clear(&mut self) {
        self.lists.iter_mut().for_each(DrawList::clear);
    }

    pub fn total(&self) -> usize {
        self.lists.iter().map(DrawList::len).sum()
    }

    /// `(kind, len)` for every list, in [`DrawListKind::ALL`] order.
    pub fn sizes(&self) -> [(DrawListKind, usize); DrawListKind::COUNT] {
        DrawListKind::ALL.map(|k| (k, self[k].len()))
    }
}

impl Index<DrawListKind> for DrawLists {
    type Output = DrawList;

    fn index(&self, kind: DrawListKind) -> &DrawList {
        &self.lists[kind as usize]
    }
}

impl IndexMut<DrawListKind> for DrawLists {
    fn index_mut(&mut self, kind: DrawListKind) -> &mut DrawList {
        &mut self.lists[kind as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite_at(actor: usize, x: f32) -> DrawItem {
        DrawItem {
            prim: Primitive::Sprite { actor },
            material: 0,
            light: 1.0,
            alpha: 0.5,
            origin: Vec3::new(x, 0.0, 0.0),
        }
    }

    #[test]
    fn back_to_front_puts_far_items_first() {
        let mut list = DrawList::default();
        for (i, x) in [10.0, 300.0, 50.0, 120.0].into_iter().enumerate() {
            list.push(sprite_at(i, x));
        }
        list.sort_back_to_front(Vec3::ZERO);
        let order: Vec<_> = list
            .iter()
            .map(|it| match it.prim {
                Primitive::Sprite { actor } => actor,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![1, 3, 2, 0]);

        list.sort_front_to_back(Vec3::ZERO);
        assert_eq!(list.iter().next().unwrap().origin.x, 10.0);
    }

    #[test]
    fn lists_are_indexed_by_kind() {
        let mut lists = DrawLists::default();
        lists[DrawListKind::Translucent].push(sprite_at(0, 1.0));
        assert_eq!(lists[DrawListKind::Translucent].len(), 1);
        assert_eq!(lists[DrawListKind::Models].len(), 0);
        assert_eq!(lists.total(), 1);
        lists.clear();
        assert_eq!(lists.total(), 0);
    }
}
