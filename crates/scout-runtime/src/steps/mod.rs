//! The perception steps.
//!
//! | Step | Outcomes | Slots |
//! |------|----------|-------|
//! | [`FindObjects`] | `objects_found`, `no_objects_found` | `found_objects` |
//! | [`TransformObjectPoses`] | `succeeded`, `no_frame_specified`, `tf_error` | `found_objects` |
//! | [`DoVisualServoing`] | `succeeded`, `failed`, `timeout`, `lost_object` | `vscount` |
//! | [`FindCavities`] | `succeeded`, `not_all_cavities_found`, `timeout` | `selected_objects`, `found_cavities` |

pub mod find_cavities;
pub mod find_objects;
pub mod transform_poses;
pub mod visual_servoing;

pub use find_cavities::FindCavities;
pub use find_objects::FindObjects;
pub use transform_poses::TransformObjectPoses;
pub use visual_servoing::DoVisualServoing;
