//! Data models for container loading.
//!
//! This module defines the value objects the loader works with:
//! - `VolumeSpec`: dimensions plus handling clearance
//! - `ItemSpec`: one requested cargo type (identity, volume, weight, stacking and orientation rules)
//! - `ContainerSpec`: one container type with its lifting capacity
//! - `LoadedItem`: an item instance that received an id when it was placed
//!
//! Item and container specs are immutable once built and compare by value, so
//! they can be used as keys for requested counts.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::ids::ItemId;
use crate::types::{Dimensional, Weighted};

/// Form type that marks cylindrical goods loaded upright.
pub const BARREL_FORM: &str = "barrel";

/// Validation error for item and container data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
}

fn validate_dimension(value: u32, name: &str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_value(value: u32, name: &str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// `value + 2 * extension` must stay representable so footprints cannot wrap.
fn validate_extended(value: u32, extension: u32, name: &str) -> Result<(), ValidationError> {
    extension
        .checked_mul(2)
        .and_then(|padding| value.checked_add(padding))
        .map(|_| ())
        .ok_or_else(|| {
            ValidationError::InvalidDimension(format!(
                "{} with extension {} is out of range",
                name, extension
            ))
        })
}

fn validate_dims(dims: (u32, u32, u32), prefix: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.0, &format!("{prefix}length"))?;
    validate_dimension(dims.1, &format!("{prefix}width"))?;
    validate_dimension(dims.2, &format!("{prefix}height"))?;
    Ok(())
}

/// Length, width and height of an object plus a handling clearance.
///
/// The extension is added on both sides of the length and the width. Height is
/// never extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VolumeSpec {
    length: u32,
    width: u32,
    height: u32,
    extension: u32,
}

impl VolumeSpec {
    /// Creates a volume without clearance.
    ///
    /// # Returns
    /// `Ok(VolumeSpec)` for positive dimensions, otherwise `Err(ValidationError)`
    pub fn new(length: u32, width: u32, height: u32) -> Result<Self, ValidationError> {
        validate_dims((length, width, height), "")?;
        Ok(Self {
            length,
            width,
            height,
            extension: 0,
        })
    }

    /// Returns the same volume with the given clearance.
    pub fn with_extension(mut self, extension: u32) -> Self {
        self.extension = extension;
        self
    }

    pub fn extension(&self) -> u32 {
        self.extension
    }

    /// Length including clearance on both ends.
    #[inline]
    pub fn extended_length(&self) -> u32 {
        self.length.saturating_add(self.extension.saturating_mul(2))
    }

    /// Width including clearance on both sides.
    #[inline]
    pub fn extended_width(&self) -> u32 {
        self.width.saturating_add(self.extension.saturating_mul(2))
    }

    /// Volume of the footprint including clearance. Saturates at `u64::MAX`.
    pub fn extended_volume(&self) -> u64 {
        u64::from(self.extended_length())
            .saturating_mul(u64::from(self.extended_width()))
            .saturating_mul(u64::from(self.height))
    }

    /// Dimensions sorted from largest to smallest.
    pub fn sorted_dims_desc(&self) -> [u32; 3] {
        let mut dims = [self.length, self.width, self.height];
        dims.sort_unstable_by(|a, b| b.cmp(a));
        dims
    }

    /// Same clearance, dimensions reassigned to (length, width, height).
    fn reassigned(&self, length: u32, width: u32, height: u32) -> Self {
        Self {
            length,
            width,
            height,
            extension: self.extension,
        }
    }
}

impl Dimensional for VolumeSpec {
    fn length(&self) -> u32 {
        self.length
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Which of the item's original axes may become the vertical axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrientationRules {
    pub height_as_height: bool,
    pub length_as_height: bool,
    pub width_as_height: bool,
}

impl OrientationRules {
    /// Only upright placement, but turning about the vertical axis is allowed.
    pub const fn upright() -> Self {
        Self {
            height_as_height: true,
            length_as_height: false,
            width_as_height: false,
        }
    }

    /// Every axis may point upwards.
    pub const fn any() -> Self {
        Self {
            height_as_height: true,
            length_as_height: true,
            width_as_height: true,
        }
    }
}

impl Default for OrientationRules {
    fn default() -> Self {
        Self::upright()
    }
}

/// A requested cargo type.
///
/// Two specs are equal only when every field matches; counts of requested
/// units are keyed by spec.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemSpec {
    name: String,
    kind: String,
    color: String,
    volume: VolumeSpec,
    diameter: Option<u32>,
    weight: u32,
    stackable: bool,
    orientation: OrientationRules,
}

impl ItemSpec {
    /// Starts a builder for an item with the given name, dimensions (length, width, height) and weight.
    ///
    /// # Examples
    /// ```
    /// use load_planner::model::ItemSpec;
    ///
    /// let crate_spec = ItemSpec::builder("crate", (10, 20, 30), 5).build();
    /// assert!(crate_spec.is_ok());
    ///
    /// let invalid = ItemSpec::builder("crate", (0, 20, 30), 5).build();
    /// assert!(invalid.is_err());
    /// ```
    pub fn builder(name: impl Into<String>, dims: (u32, u32, u32), weight: u32) -> ItemSpecBuilder {
        ItemSpecBuilder::new(name.into(), dims, weight)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    /// Canonical (unrotated) volume.
    pub fn volume_spec(&self) -> &VolumeSpec {
        &self.volume
    }

    pub fn diameter(&self) -> Option<u32> {
        self.diameter
    }

    pub fn is_stackable(&self) -> bool {
        self.stackable
    }

    pub fn orientation(&self) -> OrientationRules {
        self.orientation
    }

    /// Cylindrical items have a diameter; their footprint is always square.
    pub fn is_cylindrical(&self) -> bool {
        self.diameter.is_some()
    }

    /// Form type is exactly `barrel`; other spellings are ordinary items.
    pub fn is_barrel(&self) -> bool {
        self.kind == BARREL_FORM
    }

    /// Extended volume of one unit.
    pub fn extended_volume(&self) -> u64 {
        self.volume.extended_volume()
    }

    /// Returns the permitted orientations, canonical first.
    ///
    /// Order: canonical, quarter turn (height as height), length as height
    /// (two footprints), width as height (two footprints). Duplicates are
    /// dropped. Cylindrical items are only ever loaded upright.
    pub fn variations(&self) -> Vec<VolumeSpec> {
        let v = &self.volume;
        let (l, w, h) = (v.length, v.width, v.height);

        let mut candidates = vec![*v];
        if !self.is_cylindrical() {
            if self.orientation.height_as_height {
                candidates.push(v.reassigned(w, l, h));
            }
            if self.orientation.length_as_height {
                candidates.push(v.reassigned(w, h, l));
                candidates.push(v.reassigned(h, w, l));
            }
            if self.orientation.width_as_height {
                candidates.push(v.reassigned(l, h, w));
                candidates.push(v.reassigned(h, l, w));
            }
        }

        let mut variations: Vec<VolumeSpec> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !variations.contains(&candidate) {
                variations.push(candidate);
            }
        }
        variations
    }

    /// Loading priority: barrels first, then heavier, then non-stackable, then bulkier.
    ///
    /// `Ordering::Less` means `self` is loaded before `other`.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        other
            .is_barrel()
            .cmp(&self.is_barrel())
            .then_with(|| other.weight.cmp(&self.weight))
            .then_with(|| self.stackable.cmp(&other.stackable))
            .then_with(|| other.volume.sorted_dims_desc().cmp(&self.volume.sorted_dims_desc()))
    }
}

impl Dimensional for ItemSpec {
    fn length(&self) -> u32 {
        self.volume.length
    }

    fn width(&self) -> u32 {
        self.volume.width
    }

    fn height(&self) -> u32 {
        self.volume.height
    }
}

impl Weighted for ItemSpec {
    fn weight(&self) -> u32 {
        self.weight
    }
}

impl std::fmt::Display for ItemSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}x{}x{} (+{}) {}kg",
            self.name,
            self.kind,
            self.volume.length,
            self.volume.width,
            self.volume.height,
            self.volume.extension,
            self.weight
        )
    }
}

/// Builder for `ItemSpec`.
#[derive(Clone, Debug)]
pub struct ItemSpecBuilder {
    name: String,
    kind: String,
    color: String,
    dims: (u32, u32, u32),
    diameter: Option<u32>,
    weight: u32,
    stackable: bool,
    orientation: OrientationRules,
    extension: u32,
}

impl ItemSpecBuilder {
    fn new(name: String, dims: (u32, u32, u32), weight: u32) -> Self {
        Self {
            name,
            kind: String::from("box"),
            color: String::new(),
            dims,
            diameter: None,
            weight,
            stackable: true,
            orientation: OrientationRules::default(),
            extension: 0,
        }
    }

    /// Sets the form type, e.g. `box` or `barrel`.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Marks the item as cylindrical. Length and width are replaced by the diameter.
    pub fn diameter(mut self, diameter: u32) -> Self {
        self.diameter = Some(diameter);
        self
    }

    pub fn stackable(mut self, stackable: bool) -> Self {
        self.stackable = stackable;
        self
    }

    pub fn orientation(mut self, orientation: OrientationRules) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the handling clearance added around the footprint.
    pub fn extension(mut self, extension: u32) -> Self {
        self.extension = extension;
        self
    }

    /// Validates the parameters and creates the spec.
    pub fn build(self) -> Result<ItemSpec, ValidationError> {
        let (mut length, mut width, height) = self.dims;
        if let Some(diameter) = self.diameter {
            validate_dimension(diameter, "diameter")?;
            length = diameter;
            width = diameter;
        }
        validate_weight_value(self.weight, "Item weight")?;
        let volume = VolumeSpec::new(length, width, height)?;
        validate_extended(length, self.extension, "length")?;
        validate_extended(width, self.extension, "width")?;
        let volume = volume.with_extension(self.extension);

        Ok(ItemSpec {
            name: self.name,
            kind: self.kind,
            color: self.color,
            volume,
            diameter: self.diameter,
            weight: self.weight,
            stackable: self.stackable,
            orientation: self.orientation,
        })
    }
}

/// A container type with its lifting capacity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerSpec {
    name: String,
    volume: VolumeSpec,
    lifting_capacity: u32,
}

impl ContainerSpec {
    /// Creates a new container type after validating the parameters.
    pub fn new(
        name: impl Into<String>,
        dims: (u32, u32, u32),
        lifting_capacity: u32,
    ) -> Result<Self, ValidationError> {
        validate_dims(dims, "Container ")?;
        validate_weight_value(lifting_capacity, "Lifting capacity")?;
        Ok(Self {
            name: name.into(),
            volume: VolumeSpec::new(dims.0, dims.1, dims.2)?,
            lifting_capacity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn volume_spec(&self) -> &VolumeSpec {
        &self.volume
    }

    pub fn lifting_capacity(&self) -> u32 {
        self.lifting_capacity
    }
}

impl Dimensional for ContainerSpec {
    fn length(&self) -> u32 {
        self.volume.length
    }

    fn width(&self) -> u32 {
        self.volume.width
    }

    fn height(&self) -> u32 {
        self.volume.height
    }
}

impl std::fmt::Display for ContainerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{}x{} max {}kg",
            self.name,
            self.volume.length,
            self.volume.width,
            self.volume.height,
            self.lifting_capacity
        )
    }
}

/// An item instance that has been assigned an id.
///
/// `volume` is the orientation the item was loaded in; `spec` is the
/// requested cargo type it belongs to.
#[derive(Clone, Debug)]
pub struct LoadedItem {
    id: ItemId,
    spec: Arc<ItemSpec>,
    volume: VolumeSpec,
}

impl LoadedItem {
    pub fn new(id: ItemId, spec: Arc<ItemSpec>, volume: VolumeSpec) -> Self {
        Self { id, spec, volume }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn spec(&self) -> &Arc<ItemSpec> {
        &self.spec
    }

    /// Orientation the item occupies in the container.
    pub fn volume_spec(&self) -> &VolumeSpec {
        &self.volume
    }

    pub fn is_stackable(&self) -> bool {
        self.spec.is_stackable()
    }
}

impl Weighted for LoadedItem {
    fn weight(&self) -> u32 {
        self.spec.weight
    }
}
