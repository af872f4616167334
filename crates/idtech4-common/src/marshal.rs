// marshal.rs -- Conversions between native and module-side representations
//
// Outbound strings become owned `CString`s that are freed when they leave
// scope, on every exit path. Inbound strings are copied, never borrowed past
// the call. Vector and matrix conversions copy rows element by element and
// apply no change of basis.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::error::{BoundaryError, BoundaryResult};

// ============================================================
// Strings
// ============================================================

/// A temporary native copy of a module-side string.
///
/// Owns its buffer; the buffer is released when the value is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeString {
    inner: CString,
}

impl NativeString {
    pub fn new(s: &str) -> BoundaryResult<Self> {
        to_native(s).map(|inner| Self { inner })
    }

    pub fn as_c_str(&self) -> &CStr {
        &self.inner
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.inner.as_ptr()
    }
}

impl std::ops::Deref for NativeString {
    type Target = CStr;

    fn deref(&self) -> &CStr {
        &self.inner
    }
}

/// Native strings are 8-bit ANSI: chars up to U+00FF map to one byte each,
/// anything wider has no native form and becomes `?`.
fn encode_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn decode_ansi(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Convert a module-side string for an outbound native call.
pub fn to_native(s: &str) -> BoundaryResult<CString> {
    CString::new(encode_ansi(s)).map_err(|e| BoundaryError::InteriorNul {
        position: e.nul_position(),
    })
}

/// Like `to_native`, but drops interior NULs instead of failing. For text
/// the native side only displays or looks up.
pub fn to_native_lossy(s: &str) -> CString {
    let mut bytes = encode_ansi(s);
    bytes.retain(|&b| b != 0);
    CString::new(bytes).unwrap_or_default()
}

/// Like `to_native`, but passes `None` through (the native side reads a null
/// pointer as "use the default").
pub fn to_native_opt(s: Option<&str>) -> BoundaryResult<Option<CString>> {
    s.map(to_native).transpose()
}

/// Marshal one string, run the native call with it, release the copy.
pub fn with_native<R>(s: &str, f: impl FnOnce(&CStr) -> R) -> BoundaryResult<R> {
    let tmp = NativeString::new(s)?;
    Ok(f(&tmp))
}

/// Marshal two strings for a single native call.
pub fn with_native2<R>(a: &str, b: &str, f: impl FnOnce(&CStr, &CStr) -> R) -> BoundaryResult<R> {
    let tmp_a = NativeString::new(a)?;
    let tmp_b = NativeString::new(b)?;
    Ok(f(&tmp_a, &tmp_b))
}

/// Copy a native string into a module-side `String`.
///
/// Each ANSI byte is widened to the char with the same value, so text read
/// here goes back out through `to_native` byte for byte.
pub fn from_native(s: &CStr) -> String {
    decode_ansi(s.to_bytes())
}

/// Copy a possibly-null native string pointer.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn from_native_ptr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(from_native(CStr::from_ptr(ptr)))
    }
}

/// Bounded copy of `src` into a fixed native buffer.
///
/// Copies at most `dst.len() - 1` bytes and always NUL-terminates, so a
/// string longer than the buffer is truncated and never overflows. Returns
/// the number of bytes copied (excluding the terminator).
pub fn copy_to_fixed(dst: &mut [c_char], src: &str) -> usize {
    if dst.is_empty() {
        return 0;
    }

    let bytes = encode_ansi(src);
    // Stop at an embedded NUL the same way strncpy would.
    let src_len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let n = src_len.min(dst.len() - 1);

    for (d, &s) in dst.iter_mut().zip(&bytes[..n]) {
        *d = s as c_char;
    }
    for d in dst[n..].iter_mut() {
        *d = 0;
    }
    n
}

/// Read a fixed native buffer up to its first NUL (or its full capacity).
pub fn read_fixed(src: &[c_char]) -> String {
    let len = src.iter().position(|&c| c == 0).unwrap_or(src.len());
    let bytes: Vec<u8> = src[..len].iter().map(|&c| c as u8).collect();
    decode_ansi(&bytes)
}

// ============================================================
// Vectors and matrices
// ============================================================

/// Native 3-vector.
pub type Vec3 = [f32; 3];

/// Native 3x3 matrix, row-major.
pub type Mat3 = [[f32; 3]; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0; 3];
pub const MAT3_IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Euler angles in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Angles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Angles {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// Module-side 3-vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Module-side 4x4 matrix, row-major (`m[row][col]`, `m11` is `m[0][0]`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Matrix {
    pub m: [[f32; 4]; 4],
}

impl Matrix {
    pub fn m11(&self) -> f32 { self.m[0][0] }
    pub fn m12(&self) -> f32 { self.m[0][1] }
    pub fn m13(&self) -> f32 { self.m[0][2] }
    pub fn m21(&self) -> f32 { self.m[1][0] }
    pub fn m22(&self) -> f32 { self.m[1][1] }
    pub fn m23(&self) -> f32 { self.m[1][2] }
    pub fn m31(&self) -> f32 { self.m[2][0] }
    pub fn m32(&self) -> f32 { self.m[2][1] }
    pub fn m33(&self) -> f32 { self.m[2][2] }
}

pub fn vec3_to_vector3(v: &Vec3) -> Vector3 {
    Vector3::new(v[0], v[1], v[2])
}

pub fn vector3_to_vec3(v: &Vector3) -> Vec3 {
    [v.x, v.y, v.z]
}

/// Rows of the native matrix fill the upper-left 3x3; the fourth row and
/// column stay zero.
pub fn mat3_to_matrix(mat: &Mat3) -> Matrix {
    let mut out = Matrix::default();
    for (row, src) in out.m.iter_mut().zip(mat.iter()) {
        row[..3].copy_from_slice(src);
    }
    out
}

pub fn matrix_to_mat3(mat: &Matrix) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (dst, row) in out.iter_mut().zip(mat.m.iter()) {
        dst.copy_from_slice(&row[..3]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_nul_is_marshal_fault() {
        assert_eq!(
            to_native("ab\0c").unwrap_err(),
            BoundaryError::InteriorNul { position: 2 }
        );
        assert!(with_native("ok", |s| s.to_bytes().len()).is_ok());
    }

    #[test]
    fn test_to_native_opt_passes_none() {
        assert!(to_native_opt(None).unwrap().is_none());
        assert_eq!(
            to_native_opt(Some("base")).unwrap().unwrap().as_bytes(),
            b"base"
        );
    }

    #[test]
    fn test_fixed_round_trip_ascii() {
        let mut buf = [0 as c_char; 16];
        let n = copy_to_fixed(&mut buf, "deathmatch");
        assert_eq!(n, 10);
        assert_eq!(read_fixed(&buf), "deathmatch");
    }

    #[test]
    fn test_fixed_truncates_without_overflow() {
        let mut buf = [0x7f as c_char; 8];
        let n = copy_to_fixed(&mut buf, "0123456789abcdef");
        assert_eq!(n, 7);
        assert_eq!(buf[7], 0);
        assert_eq!(read_fixed(&buf), "0123456");
    }

    #[test]
    fn test_fixed_zero_capacity() {
        let mut buf: [c_char; 0] = [];
        assert_eq!(copy_to_fixed(&mut buf, "abc"), 0);
    }

    #[test]
    fn test_from_native_latin1() {
        let raw = CString::new(vec![b'c', 0xe9, b'a']).unwrap();
        assert_eq!(from_native(&raw), "c\u{e9}a");
        assert_eq!(unsafe { from_native_ptr(std::ptr::null()) }, None);
        assert_eq!(unsafe { from_native_ptr(raw.as_ptr()) }.as_deref(), Some("c\u{e9}a"));
    }

    #[test]
    fn test_ansi_bytes_survive_round_trip() {
        let raw = CString::new(vec![0x63, 0x61, 0x66, 0xe9]).unwrap();
        let text = from_native(&raw);
        assert_eq!(to_native(&text).unwrap().as_bytes(), &[0x63, 0x61, 0x66, 0xe9]);

        let mut buf = [0 as c_char; 8];
        assert_eq!(copy_to_fixed(&mut buf, &text), 4);
        assert_eq!(buf[3] as u8, 0xe9);
        assert_eq!(read_fixed(&buf), text);

        // No ANSI form.
        assert_eq!(to_native("a\u{263a}b").unwrap().as_bytes(), b"a?b");
        assert_eq!(to_native_lossy("a\0\u{e9}").as_bytes(), &[b'a', 0xe9]);
        assert_eq!(
            NativeString::new("caf\u{e9}").unwrap().to_bytes(),
            &[0x63, 0x61, 0x66, 0xe9]
        );
    }

    #[test]
    fn test_matrix_rows_copied() {
        let mat: Mat3 = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let m = mat3_to_matrix(&mat);
        assert_eq!((m.m11(), m.m12(), m.m13()), (1.0, 2.0, 3.0));
        assert_eq!((m.m31(), m.m32(), m.m33()), (7.0, 8.0, 9.0));
        assert_eq!(m.m[3], [0.0; 4]);
        assert_eq!(m.m[0][3], 0.0);
        assert_eq!(matrix_to_mat3(&m), mat);
    }
}
