// Format-agnostic repository of material descriptors registered by the asset
// layer. The renderer and world data interact through `MaterialId` only.

use std::collections::HashMap;

/// Runtime handle for a material in this bank.
///
/// *Guaranteed* to remain stable for the lifetime of the bank.
pub type MaterialId = u16;

/// `MaterialId` of the placeholder. Level data also uses it for "no texture"
/// (e.g. a missing upper texture).
/// Always = 0 because `MaterialBank::new()` inserts it first.
pub const NO_MATERIAL: MaterialId = 0;

/// How a surface using this material blends with what is behind it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Surface {
    #[default]
    Opaque,
    /// Alpha-tested cutouts (grates, sprites, mid textures).
    Masked,
    /// Needs blending, so it must be sorted.
    Translucent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub surface: Surface,
    /// Sky flats open a sky portal instead of being drawn.
    pub sky: bool,
}

/// The checkerboard placeholder.
impl Default for Material {
    fn default() -> Self {
        Material {
            name: "MISSING".to_string(),
            surface: Surface::Opaque,
            sky: false,
        }
    }
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MaterialError {
    /// Attempted to insert a second material with an existing name.
    #[error("material name `{0}` already present in bank")]
    Duplicate(String),
}

/// A cache of material descriptors.
///
/// * Does **not** decode pixels; loaders fill in the descriptors.
/// * Stores exactly one copy of every name.
/// * ID **0** is always the placeholder, and [`MaterialBank::resolve`] falls
///   back to it, so material resolution never fails.
pub struct MaterialBank {
    by_name: HashMap<String, MaterialId>,
    data: Vec<Material>,
}

impl MaterialBank {
    /// Create an empty bank with a mandatory placeholder inserted under the
    /// fixed name `"MISSING"` with handle **0**.
    pub fn new(placeholder: Material) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("MISSING".into(), NO_MATERIAL);
        Self {
            by_name,
            data: vec![placeholder],
        }
    }

    pub fn default_with_placeholder() -> Self {
        Self::new(Material::default())
    }

    /// Number of materials stored (including the placeholder).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// Obtain the id for a registered material by name.
    pub fn id(&self, name: &str) -> Option<MaterialId> {
        self.by_name.get(name).copied()
    }

    /// Never fails: unknown ids yield the placeholder.
    #[inline]
    pub fn resolve(&self, id: MaterialId) -> &Material {
        self.data.get(id as usize).unwrap_or(&self.data[0])
    }

    /// Like [`resolve`](Self::resolve) but returns the id that will actually be bound.
    #[inline]
    pub fn resolve_id(&self, id: MaterialId) -> MaterialId {
        if (id as usize) < self.data.len() {
            id
        } else {
            NO_MATERIAL
        }
    }

    /// Insert a material under `name`.
    ///
    /// * Returns the newly assigned `MaterialId`.
    /// * Fails if the name already exists (`Duplicate`).
    pub fn insert<S: Into<String>>(
        &mut self,
        name: S,
        mat: Material,
    ) -> Result<MaterialId, MaterialError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(MaterialError::Duplicate(name));
        }
        let id = self.data.len() as MaterialId;
        self.data.push(mat);
        self.by_name.insert(name, id);
        Ok(id)
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
