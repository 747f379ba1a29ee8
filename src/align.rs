/// Rounds a requested size up to the nearest multiple of the 8-byte heap
/// alignment.
///
/// Every size handed to the allocators passes through this before it is
/// compared against a block's payload, so payload sizes stay multiples of 8
/// and the low bit of every header word is free to hold the status flag.
///
/// # Examples
///
/// ```rust
/// use fitalloc::roundup;
///
/// assert_eq!(roundup!(1), 8);
/// assert_eq!(roundup!(13), 16);
/// assert_eq!(roundup!(16), 16);
/// assert_eq!(roundup!(0), 0);
/// ```
#[macro_export]
macro_rules! roundup {
  ($value:expr) => {
    ($value + $crate::ALIGNMENT - 1) & !($crate::ALIGNMENT - 1)
  };
}
