use std::fmt;

/// Byte count printed with the largest binary unit that divides it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub(crate) struct MemSize(pub usize);

impl fmt::Display for MemSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u32, &str); 4] = [(40, "TiB"), (30, "GiB"), (20, "MiB"), (10, "KiB")];

        if self.0 == 0 {
            return write!(f, "0");
        }
        let zeros = self.0.trailing_zeros();
        let (num, unit) = UNITS
            .iter()
            .find(|(shift, _)| zeros >= *shift)
            .map_or((self.0, "B"), |&(shift, unit)| (self.0 >> shift, unit));

        let digits = num.to_string();
        let head = match digits.len() % 3 {
            0 => 3,
            n => n,
        };
        write!(f, "{}", &digits[..head])?;
        for group in digits.as_bytes()[head..].chunks(3) {
            // ascii digits
            write!(f, ",{}", std::str::from_utf8(group).unwrap())?;
        }
        write!(f, "{unit}")
    }
}

#[test]
fn test_mem_size() {
    assert_eq!(MemSize(0).to_string(), "0");
    assert_eq!(MemSize(1000).to_string(), "1,000B");
    assert_eq!(MemSize(4096).to_string(), "4KiB");
    assert_eq!(MemSize(1234567 << 20).to_string(), "1,234,567MiB");
    assert_eq!(MemSize(3 << 30).to_string(), "3GiB");
}
