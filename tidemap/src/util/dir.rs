use glam::IVec2;


/// One of the four grid directions. The Y axis grows downward, like screen space, so
/// `Up` is the negative Y direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Dir {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Dir {

    /// Array containing all 4 directions, in clockwise order from up.
    pub const ALL: [Self; 4] = [Self::Up, Self::Right, Self::Down, Self::Left];

    /// Index of this direction, usable in `[_; 4]` arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get the opposite direction.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Dir::Up => Dir::Down,
            Dir::Right => Dir::Left,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
        }
    }

    /// Get the delta vector for this direction.
    #[inline]
    pub fn delta(self) -> IVec2 {
        match self {
            Dir::Up => IVec2::NEG_Y,
            Dir::Right => IVec2::X,
            Dir::Down => IVec2::Y,
            Dir::Left => IVec2::NEG_X,
        }
    }

}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn opposite_cancels_delta() {
        for dir in Dir::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.delta() + dir.opposite().delta(), IVec2::ZERO);
            assert_eq!(Dir::ALL[dir.index()], dir);
        }
    }

}
