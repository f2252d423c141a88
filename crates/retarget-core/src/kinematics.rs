//! Robot kinematic state consumed at reset

use nalgebra::{DVector, Isometry3, Vector3};

/// Kinematic quantities of the robot at the current control tick
pub trait KinematicState {
    fn head_to_world(&self) -> Isometry3<f64>;

    fn left_hand_to_world(&self) -> Isometry3<f64>;

    fn right_hand_to_world(&self) -> Isometry3<f64>;

    /// Positions of every controlled joint, in controlled-joint order
    fn joint_positions(&self) -> DVector<f64>;

    fn com_position(&self) -> Vector3<f64>;
}

/// Fixed kinematic state, for tools and tests
#[derive(Debug, Clone, PartialEq)]
pub struct StaticKinematics {
    pub head_to_world: Isometry3<f64>,
    pub left_hand_to_world: Isometry3<f64>,
    pub right_hand_to_world: Isometry3<f64>,
    pub joint_positions: DVector<f64>,
    pub com_position: Vector3<f64>,
}

impl StaticKinematics {
    /// All frames at the world origin and `joint_count` joints at zero
    pub fn new(joint_count: usize) -> Self {
        Self {
            head_to_world: Isometry3::identity(),
            left_hand_to_world: Isometry3::identity(),
            right_hand_to_world: Isometry3::identity(),
            joint_positions: DVector::zeros(joint_count),
            com_position: Vector3::zeros(),
        }
    }

    pub fn with_head(mut self, head_to_world: Isometry3<f64>) -> Self {
        self.head_to_world = head_to_world;
        self
    }

    pub fn with_hands(mut self, left: Isometry3<f64>, right: Isometry3<f64>) -> Self {
        self.left_hand_to_world = left;
        self.right_hand_to_world = right;
        self
    }

    pub fn with_joint_positions(mut self, positions: DVector<f64>) -> Self {
        self.joint_positions = positions;
        self
    }

    pub fn with_com_height(mut self, height: f64) -> Self {
        self.com_position.z = height;
        self
    }
}

impl KinematicState for StaticKinematics {
    fn head_to_world(&self) -> Isometry3<f64> {
        self.head_to_world
    }

    fn left_hand_to_world(&self) -> Isometry3<f64> {
        self.left_hand_to_world
    }

    fn right_hand_to_world(&self) -> Isometry3<f64> {
        self.right_hand_to_world
    }

    fn joint_positions(&self) -> DVector<f64> {
        self.joint_positions.clone()
    }

    fn com_position(&self) -> Vector3<f64> {
        self.com_position
    }
}
