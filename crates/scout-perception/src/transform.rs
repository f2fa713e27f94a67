//! Spatial frame transforms.
//!
//! Steps only need one thing from this module: the [`TransformService`]
//! seam, `transform(pose, target_frame, max_wait) -> pose | error`.
//!
//! [`TfListener`] is the in-process implementation.  It keeps a
//! [`FrameTree`] of named reference frames connected by rigid-body
//! [`Transform`]s, and waits up to `max_wait` for a path between two frames
//! to become known before giving up.
//!
//! # Example
//!
//! ```rust
//! use scout_perception::transform::{FrameTree, Transform};
//! use scout_types::{Orientation, Point, Pose, StampedPose};
//!
//! let mut tree = FrameTree::new();
//! // The camera sits 0.5 m above the arm base.
//! tree.set_transform("base_link", "camera",
//!     Transform::new(Point::new(0.0, 0.0, 0.5), Orientation::identity()));
//!
//! let seen = StampedPose::new("camera", Pose::new(Point::new(0.1, 0.0, 0.2), Orientation::identity()));
//! let in_base = tree.transform_pose(&seen, "base_link").unwrap();
//! assert_eq!(in_base.frame_id, "base_link");
//! assert!((in_base.pose.position.z - 0.7).abs() < 1e-9);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scout_types::{Orientation, Point, Pose, ScoutError, StampedPose};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Why a pose could not be expressed in the requested frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("no transform between {from_frame} and {to_frame}")]
    LookupFailed { from_frame: String, to_frame: String },

    #[error("transform {from_frame} -> {to_frame} unavailable after {waited:?}")]
    Timeout {
        from_frame: String,
        to_frame: String,
        waited: Duration,
    },
}

impl From<TransformError> for ScoutError {
    fn from(err: TransformError) -> Self {
        let (from_frame, to_frame) = match &err {
            TransformError::LookupFailed { from_frame, to_frame }
            | TransformError::Timeout {
                from_frame,
                to_frame,
                ..
            } => (from_frame.clone(), to_frame.clone()),
        };
        ScoutError::Transform {
            from_frame,
            to_frame,
            details: err.to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Service seam
// ────────────────────────────────────────────────────────────────────────────

/// Re-expresses poses in another reference frame.
#[async_trait]
pub trait TransformService: Send + Sync {
    /// Express `pose` in `target_frame`, waiting at most `max_wait` for the
    /// necessary transform to become available.
    async fn transform(
        &self,
        pose: &StampedPose,
        target_frame: &str,
        max_wait: Duration,
    ) -> Result<StampedPose, TransformError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Transform
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body transform from a child frame into its parent frame: rotate a
/// child-frame point by `rotation`, then add `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Point,
    pub rotation: Orientation,
}

impl Transform {
    pub fn new(translation: Point, rotation: Orientation) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Point::default(), Orientation::identity())
    }

    /// If `self` is T_a_b and `other` is T_b_c, returns T_a_c.
    pub fn compose(self, other: Self) -> Self {
        let rotated = rotate(self.rotation, other.translation);
        Self::new(
            Point::new(
                self.translation.x + rotated.x,
                self.translation.y + rotated.y,
                self.translation.z + rotated.z,
            ),
            hamilton(self.rotation, other.rotation),
        )
    }

    /// T_b_a for `self` = T_a_b.
    pub fn inverse(self) -> Self {
        let rotation = conjugate(self.rotation);
        let t = rotate(rotation, self.translation);
        Self::new(Point::new(-t.x, -t.y, -t.z), rotation)
    }

    /// Map a pose expressed in the child frame into the parent frame.
    pub fn apply(self, pose: Pose) -> Pose {
        let mapped = self.compose(Transform::new(pose.position, pose.orientation));
        Pose::new(mapped.translation, mapped.rotation)
    }
}

fn hamilton(a: Orientation, b: Orientation) -> Orientation {
    Orientation::new(
        a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
    )
}

fn conjugate(q: Orientation) -> Orientation {
    Orientation::new(q.w, -q.x, -q.y, -q.z)
}

fn rotate(q: Orientation, p: Point) -> Point {
    let v = hamilton(hamilton(q, Orientation::new(0.0, p.x, p.y, p.z)), conjugate(q));
    Point::new(v.x, v.y, v.z)
}

// ────────────────────────────────────────────────────────────────────────────
// FrameTree
// ────────────────────────────────────────────────────────────────────────────

/// Named reference frames connected by [`Transform`]s.
///
/// Every registered parent→child edge is also stored in inverted form, so a
/// lookup can walk the tree in either direction.
#[derive(Debug, Default, Clone)]
pub struct FrameTree {
    /// `edges[a][b]` maps points in frame `b` into frame `a`.
    edges: HashMap<String, HashMap<String, Transform>>,
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the pose of `child_frame` relative to
    /// `parent_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
        self.edges
            .entry(child_frame.to_string())
            .or_default()
            .insert(parent_frame.to_string(), transform.inverse());
    }

    /// The transform that maps points in `source_frame` into `target_frame`,
    /// or `None` when the frames are not connected.
    pub fn lookup(&self, target_frame: &str, source_frame: &str) -> Option<Transform> {
        if target_frame == source_frame {
            return Some(Transform::identity());
        }

        let mut queue: VecDeque<(&str, Transform)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        queue.push_back((target_frame, Transform::identity()));
        visited.insert(target_frame);

        while let Some((current, accumulated)) = queue.pop_front() {
            let Some(neighbours) = self.edges.get(current) else {
                continue;
            };
            for (next, edge) in neighbours {
                if !visited.insert(next.as_str()) {
                    continue;
                }
                let composed = accumulated.compose(*edge);
                if next == source_frame {
                    return Some(composed);
                }
                queue.push_back((next.as_str(), composed));
            }
        }
        None
    }

    /// Express `pose` in `target_frame`.
    pub fn transform_pose(
        &self,
        pose: &StampedPose,
        target_frame: &str,
    ) -> Result<StampedPose, TransformError> {
        let transform = self.lookup(target_frame, &pose.frame_id).ok_or_else(|| {
            TransformError::LookupFailed {
                from_frame: pose.frame_id.clone(),
                to_frame: target_frame.to_string(),
            }
        })?;
        Ok(StampedPose {
            frame_id: target_frame.to_string(),
            stamp: pose.stamp,
            pose: transform.apply(pose.pose),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfListener
// ────────────────────────────────────────────────────────────────────────────

/// Shared, updatable [`FrameTree`] implementing [`TransformService`].
///
/// Clones share the same tree.  Publishers call
/// [`TfListener::set_transform`]; waiting callers wake up as soon as a
/// connecting edge arrives.
#[derive(Clone, Debug)]
pub struct TfListener {
    tree: Arc<watch::Sender<FrameTree>>,
}

impl Default for TfListener {
    fn default() -> Self {
        Self::new()
    }
}

impl TfListener {
    pub fn new() -> Self {
        Self::from_tree(FrameTree::new())
    }

    pub fn from_tree(tree: FrameTree) -> Self {
        let (tree, _) = watch::channel(tree);
        Self {
            tree: Arc::new(tree),
        }
    }

    pub fn set_transform(&self, parent_frame: &str, child_frame: &str, transform: Transform) {
        self.tree
            .send_modify(|tree| tree.set_transform(parent_frame, child_frame, transform));
    }
}

#[async_trait]
impl TransformService for TfListener {
    async fn transform(
        &self,
        pose: &StampedPose,
        target_frame: &str,
        max_wait: Duration,
    ) -> Result<StampedPose, TransformError> {
        let mut rx = self.tree.subscribe();
        let source = pose.frame_id.as_str();
        let waited = tokio::time::timeout(
            max_wait,
            rx.wait_for(|tree| tree.lookup(target_frame, source).is_some()),
        )
        .await;
        match waited {
            Ok(Ok(tree)) => tree.transform_pose(pose, target_frame),
            Ok(Err(_)) | Err(_) => {
                debug!(from = source, to = target_frame, ?max_wait, "transform wait expired");
                Err(TransformError::Timeout {
                    from_frame: source.to_string(),
                    to_frame: target_frame.to_string(),
                    waited: max_wait,
                })
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn yaw90() -> Orientation {
        Orientation::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2)
    }

    fn at(frame: &str, x: f64, y: f64, z: f64) -> StampedPose {
        StampedPose::new(frame, Pose::new(Point::new(x, y, z), Orientation::identity()))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rotate_yaw90_maps_x_to_y() {
        let r = rotate(yaw90(), Point::new(1.0, 0.0, 0.0));
        assert!(close(r.x, 0.0), "x={}", r.x);
        assert!(close(r.y, 1.0), "y={}", r.y);
    }

    #[test]
    fn compose_with_inverse_is_identity() {
        let t = Transform::new(Point::new(1.0, 2.0, 3.0), yaw90());
        let id = t.compose(t.inverse());
        assert!(close(id.translation.x, 0.0));
        assert!(close(id.translation.y, 0.0));
        assert!(close(id.translation.z, 0.0));
        assert!(close(id.rotation.w.abs(), 1.0));
    }

    #[test]
    fn same_frame_is_identity() {
        let tree = FrameTree::new();
        assert_eq!(tree.lookup("base_link", "base_link"), Some(Transform::identity()));
    }

    #[test]
    fn child_pose_maps_into_parent() {
        let mut tree = FrameTree::new();
        tree.set_transform(
            "base_link",
            "camera",
            Transform::new(Point::new(0.2, 0.0, 0.5), Orientation::identity()),
        );
        let out = tree.transform_pose(&at("camera", 0.1, 0.0, 0.0), "base_link").unwrap();
        assert_eq!(out.frame_id, "base_link");
        assert!(close(out.pose.position.x, 0.3));
        assert!(close(out.pose.position.z, 0.5));
    }

    #[test]
    fn parent_pose_maps_into_child_through_inverse_edge() {
        let mut tree = FrameTree::new();
        tree.set_transform(
            "base_link",
            "camera",
            Transform::new(Point::new(0.2, 0.0, 0.5), Orientation::identity()),
        );
        let out = tree.transform_pose(&at("base_link", 0.3, 0.0, 0.5), "camera").unwrap();
        assert!(close(out.pose.position.x, 0.1));
        assert!(close(out.pose.position.z, 0.0));
    }

    #[test]
    fn rotation_is_respected_along_a_chain() {
        // odom -> base_link rotated 90° about Z, base_link -> camera 1 m forward.
        let mut tree = FrameTree::new();
        tree.set_transform("odom", "base_link", Transform::new(Point::default(), yaw90()));
        tree.set_transform(
            "base_link",
            "camera",
            Transform::new(Point::new(1.0, 0.0, 0.0), Orientation::identity()),
        );
        let out = tree.transform_pose(&at("camera", 0.0, 0.0, 0.0), "odom").unwrap();
        assert!(close(out.pose.position.x, 0.0), "x={}", out.pose.position.x);
        assert!(close(out.pose.position.y, 1.0), "y={}", out.pose.position.y);
    }

    #[test]
    fn disconnected_frames_fail_lookup() {
        let mut tree = FrameTree::new();
        tree.set_transform("base_link", "camera", Transform::identity());
        let err = tree.transform_pose(&at("gripper", 0.0, 0.0, 0.0), "base_link").unwrap_err();
        assert!(matches!(err, TransformError::LookupFailed { .. }));
    }

    #[test]
    fn transform_error_converts_into_scout_error() {
        let err: ScoutError = TransformError::LookupFailed {
            from_frame: "camera".into(),
            to_frame: "base_link".into(),
        }
        .into();
        assert!(matches!(err, ScoutError::Transform { ref from_frame, .. } if from_frame == "camera"));
    }

    #[tokio::test]
    async fn listener_transforms_known_frames_immediately() {
        let tf = TfListener::new();
        tf.set_transform(
            "base_link",
            "camera",
            Transform::new(Point::new(0.0, 0.0, 1.0), Orientation::identity()),
        );
        let out = tf
            .transform(&at("camera", 0.0, 0.0, 0.0), "base_link", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(close(out.pose.position.z, 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn listener_times_out_on_unknown_frame() {
        let tf = TfListener::new();
        let started = tokio::time::Instant::now();
        let err = tf
            .transform(&at("camera", 0.0, 0.0, 0.0), "base_link", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn listener_wakes_when_transform_arrives() {
        let tf = TfListener::new();
        let publisher = tf.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.set_transform("base_link", "camera", Transform::identity());
        });
        let out = tf
            .transform(&at("camera", 0.5, 0.0, 0.0), "base_link", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(close(out.pose.position.x, 0.5));
    }
}
