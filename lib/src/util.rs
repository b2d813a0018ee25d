/// Elements with a width, measured in slots
///
/// Most constant pool entries take 1 slot, but `long` and `double` take 2 (the slot after them is
/// unusable).
pub trait Width {
    fn width(&self) -> usize;
}
