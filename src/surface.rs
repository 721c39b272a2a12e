use crate::command::Command;

/// The UI layer as seen by the session: somewhere to put frames and
/// somewhere user commands come from.
pub trait Surface {
    /// Replaces the displayed bitmap.
    fn render(&mut self, bitmap: image::RgbImage);

    /// Removes the displayed bitmap.
    fn clear(&mut self);

    /// Next command the user issued, if any.
    fn next_command(&mut self) -> Option<Command>;
}
