// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conversions between wire vectors and robot-side values
//!
//! Pose vectors are `[x, y, z, roll, pitch, yaw]` with the rotation composed
//! as `Rz(yaw) * Ry(pitch) * Rx(roll)`. Joint updates carry only the
//! retargeted joints and are scattered into the dense controlled-joint vector
//! through a [`JointIndexMap`].

use crate::error::{RetargetingError, RetargetingResult};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use std::collections::HashMap;
use thiserror::Error;

/// Length of a pose vector
pub const POSE_VECTOR_SIZE: usize = 6;

/// Index of the height in a CoM sample (`[x, y, z]`)
pub const COM_HEIGHT_INDEX: usize = 2;

/// A sample that cannot be applied
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("expected at least {min} values, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("dense index {index} out of range for {len} joints")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("value at index {index} is not finite")]
    NonFinite { index: usize },
}

fn check_finite(values: &[f64]) -> Result<(), WireError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(WireError::NonFinite { index }),
        None => Ok(()),
    }
}

/// Decode a pose vector into a rigid transform
pub fn pose_vector_to_transform(values: &[f64]) -> Result<Isometry3<f64>, WireError> {
    if values.len() != POSE_VECTOR_SIZE {
        return Err(WireError::LengthMismatch {
            expected: POSE_VECTOR_SIZE,
            actual: values.len(),
        });
    }
    check_finite(values)?;
    Ok(pose_from_components(values))
}

/// Encode a rigid transform as a pose vector
pub fn transform_to_pose_vector(transform: &Isometry3<f64>) -> [f64; POSE_VECTOR_SIZE] {
    let position = transform.translation.vector;
    let (roll, pitch, yaw) = transform.rotation.euler_angles();
    [position.x, position.y, position.z, roll, pitch, yaw]
}

/// Caller guarantees at least six values
pub(crate) fn pose_from_components(values: &[f64]) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(values[0], values[1], values[2]),
        UnitQuaternion::from_euler_angles(values[3], values[4], values[5]),
    )
}

/// Dense index of every retargeted joint, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointIndexMap {
    indices: Vec<usize>,
    dense_len: usize,
}

impl JointIndexMap {
    /// Look every retargeted joint up in the controlled-joint list
    ///
    /// A name that appears twice in `controlled` resolves to its first
    /// position. Any retargeted name missing from `controlled` is an error.
    pub fn resolve(retargeted: &[String], controlled: &[String]) -> RetargetingResult<Self> {
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(controlled.len());
        for (index, name) in controlled.iter().enumerate() {
            by_name.entry(name.as_str()).or_insert(index);
        }

        let indices = retargeted
            .iter()
            .map(|name| {
                by_name
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| RetargetingError::UnresolvedJoint { name: name.clone() })
            })
            .collect::<RetargetingResult<Vec<_>>>()?;

        Ok(Self {
            indices,
            dense_len: controlled.len(),
        })
    }

    /// Dense index of each wire position
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of values in a wire message
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Size of the dense controlled-joint vector
    pub fn dense_len(&self) -> usize {
        self.dense_len
    }
}

/// Write a sparse joint update into `dense`
///
/// The whole update is validated before the first write, so a rejected
/// update leaves `dense` untouched.
pub fn scatter_joint_update(
    sparse: &[f64],
    map: &JointIndexMap,
    dense: &mut [f64],
) -> Result<(), WireError> {
    if sparse.len() != map.len() {
        return Err(WireError::LengthMismatch {
            expected: map.len(),
            actual: sparse.len(),
        });
    }
    if let Some(&index) = map.indices.iter().find(|&&index| index >= dense.len()) {
        return Err(WireError::IndexOutOfRange {
            index,
            len: dense.len(),
        });
    }
    check_finite(sparse)?;

    for (&index, &value) in map.indices.iter().zip(sparse) {
        dense[index] = value;
    }
    Ok(())
}

/// Height carried by a CoM sample
pub fn com_height_from_sample(sample: &[f64]) -> Result<f64, WireError> {
    if sample.len() <= COM_HEIGHT_INDEX {
        return Err(WireError::TooShort {
            min: COM_HEIGHT_INDEX + 1,
            actual: sample.len(),
        });
    }
    let height = sample[COM_HEIGHT_INDEX];
    if !height.is_finite() {
        return Err(WireError::NonFinite {
            index: COM_HEIGHT_INDEX,
        });
    }
    Ok(height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pose_vector_rotation_order() {
        let transform =
            pose_vector_to_transform(&[1.0, 2.0, 3.0, 0.1, 0.2, 0.3]).unwrap();

        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3)
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.2)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.1);

        assert_eq!(transform.translation.vector, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(
            transform.rotation.to_rotation_matrix(),
            expected.to_rotation_matrix(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_pose_vector_encode_decode_agree() {
        let original = [0.3, -0.1, 0.25, 0.4, -0.3, 1.2];
        let encoded = transform_to_pose_vector(&pose_vector_to_transform(&original).unwrap());
        for (a, b) in original.iter().zip(encoded.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pose_vector_rejects_bad_samples() {
        assert_eq!(
            pose_vector_to_transform(&[0.0; 5]),
            Err(WireError::LengthMismatch {
                expected: 6,
                actual: 5
            })
        );
        assert_eq!(
            pose_vector_to_transform(&[0.0, 0.0, f64::NAN, 0.0, 0.0, 0.0]),
            Err(WireError::NonFinite { index: 2 })
        );
    }

    #[test]
    fn test_resolve_maps_names_to_dense_indices() {
        let controlled = names(&["torso_pitch", "neck_pitch", "neck_roll", "neck_yaw"]);
        let map = JointIndexMap::resolve(&names(&["neck_yaw", "torso_pitch"]), &controlled)
            .unwrap();

        assert_eq!(map.indices(), &[3, 0]);
        assert_eq!(map.dense_len(), 4);
    }

    #[test]
    fn test_resolve_rejects_unknown_joint() {
        let controlled = names(&["neck_pitch", "neck_yaw"]);
        let result = JointIndexMap::resolve(&names(&["neck_pitch", "l_elbow"]), &controlled);

        match result {
            Err(RetargetingError::UnresolvedJoint { name }) => assert_eq!(name, "l_elbow"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_scatter_touches_only_mapped_slots() {
        let controlled = names(&["a", "b", "c", "d", "e"]);
        let map = JointIndexMap::resolve(&names(&["d", "b"]), &controlled).unwrap();
        let mut dense = [10.0, 11.0, 12.0, 13.0, 14.0];

        scatter_joint_update(&[0.4, 0.2], &map, &mut dense).unwrap();

        assert_eq!(dense, [10.0, 0.2, 12.0, 0.4, 14.0]);
    }

    #[test]
    fn test_rejected_scatter_leaves_dense_untouched() {
        let controlled = names(&["a", "b", "c"]);
        let map = JointIndexMap::resolve(&names(&["a", "c"]), &controlled).unwrap();
        let mut dense = [1.0, 2.0, 3.0];

        assert_eq!(
            scatter_joint_update(&[9.0], &map, &mut dense),
            Err(WireError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            scatter_joint_update(&[9.0, f64::INFINITY], &map, &mut dense),
            Err(WireError::NonFinite { index: 1 })
        );
        let mut short = [1.0, 2.0];
        assert_eq!(
            scatter_joint_update(&[9.0, 9.0], &map, &mut short),
            Err(WireError::IndexOutOfRange { index: 2, len: 2 })
        );

        assert_eq!(dense, [1.0, 2.0, 3.0]);
        assert_eq!(short, [1.0, 2.0]);
    }

    #[test]
    fn test_com_height_uses_third_value() {
        assert_eq!(com_height_from_sample(&[0.1, 0.2, 0.75]), Ok(0.75));
        assert_eq!(com_height_from_sample(&[0.1, 0.2, 0.75, 9.0]), Ok(0.75));
        assert_eq!(
            com_height_from_sample(&[0.75]),
            Err(WireError::TooShort { min: 3, actual: 1 })
        );
    }
}
