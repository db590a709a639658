use crate::material::GpuType;

/// One value inside a packed uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Item {
    /// Type as laid out, i.e. after vec3 → vec4 padding.
    pub ty: GpuType,
    /// Byte offset inside the block.
    pub offset: usize,
    /// Byte size (`components * 4`).
    pub size: usize,
}

impl Item {
    /// Byte range covered by the item.
    #[inline]
    pub fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// Items of a packed uniform block, in packed order.
///
/// Items are appended back to back; the table never reorders or removes them.
#[derive(Debug, Clone, Default)]
pub struct ItemTable {
    items: Vec<Item>,
    size: usize,
}

impl ItemTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { items: Vec::with_capacity(capacity), size: 0 }
    }

    /// Appends an item at the current end of the block.
    ///
    /// # Panics
    /// Panics for types wider than a vec4; their padding rules are not handled.
    pub fn push(&mut self, ty: GpuType) -> &Item {
        assert!(ty.fits_ubo(), "{ty:?} cannot be stored in a dynamic uniform buffer");

        let item = Item { ty, offset: self.size, size: ty.byte_size() };
        self.size += item.size;
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    /// Item at packed position `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, Item> {
        self.items.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total block size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl core::ops::Index<usize> for ItemTable {
    type Output = Item;

    #[inline]
    fn index(&self, index: usize) -> &Item {
        &self.items[index]
    }
}

impl<'a> IntoIterator for &'a ItemTable {
    type Item = &'a Item;
    type IntoIter = core::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
