/// Vertex structure with view-space position, screen position, and world normal
#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub position: [f64; 3],
    pub screen_position: [f64; 2],
    pub normal: [f64; 3],
    /// Distance along the view axis, used for depth testing
    pub depth: f64,
}
