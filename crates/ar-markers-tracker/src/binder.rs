use std::fmt::Debug;

use ar_markers_core::ObjectTransform;

/// Narrow interface to whatever owns the visual objects.
///
/// The tracker decides *when* objects are created, moved and destroyed; the
/// binder only carries it out. Handles returned by
/// [`SceneBinder::instantiate`] must be unique among live objects.
pub trait SceneBinder {
    /// Template an object is instantiated from.
    type Prototype;
    /// Opaque reference to a live object.
    type Handle: Clone + Debug;

    /// Whether `prototype` can be instantiated. Checked once at startup.
    fn has_prototype(&self, _prototype: &Self::Prototype) -> bool {
        true
    }

    fn instantiate(&mut self, prototype: &Self::Prototype) -> Self::Handle;

    fn set_transform(&mut self, handle: &Self::Handle, transform: &ObjectTransform);

    fn destroy(&mut self, handle: Self::Handle);
}
