//! Primitive string and memory routines
//!
//! Everything works on byte slices. A "C string" is the prefix of a
//! slice up to the first NUL, or the whole slice if it has none.
//! Routines that write never go past the end of their destination:
//! if the result would not fit they write nothing and return
//! `false`.

use std::cmp::Ordering;

/// The C string prefix of `s`
pub fn cstr(s: &[u8]) -> &[u8] {
    &s[..strlen(s)]
}

/// Length of the C string in `s`
pub fn strlen(s: &[u8]) -> usize {
    memchr(s, 0, s.len()).unwrap_or(s.len())
}

/// Copy the C string `src` (with terminator) into `dest`
pub fn strcpy(dest: &mut [u8], src: &[u8]) -> bool {
    let src = cstr(src);
    if src.len() >= dest.len() {
        return false;
    }
    dest[..src.len()].copy_from_slice(src);
    dest[src.len()] = 0;
    true
}

/// Copy at most `n` bytes of `src`, padding with NULs up to `n`
///
/// As in C, the result is not terminated if `src` has `n` or more
/// bytes.
pub fn strncpy(dest: &mut [u8], src: &[u8], n: usize) -> bool {
    if n > dest.len() {
        return false;
    }
    let src = cstr(src);
    let copied = src.len().min(n);
    dest[..copied].copy_from_slice(&src[..copied]);
    dest[copied..n].fill(0);
    true
}

/// Append the C string `src` to the C string already in `dest`
pub fn strcat(dest: &mut [u8], src: &[u8]) -> bool {
    strncat(dest, src, usize::MAX)
}

/// Append at most `n` bytes of `src`, always terminating
pub fn strncat(dest: &mut [u8], src: &[u8], n: usize) -> bool {
    let start = strlen(dest);
    let src = cstr(src);
    let copied = src.len().min(n);
    if start + copied >= dest.len() {
        return false;
    }
    dest[start..start + copied].copy_from_slice(&src[..copied]);
    dest[start + copied] = 0;
    true
}

/// Compare two C strings as unsigned bytes
pub fn strcmp(a: &[u8], b: &[u8]) -> i32 {
    strncmp(a, b, usize::MAX)
}

/// Compare at most `n` bytes of two C strings
pub fn strncmp(a: &[u8], b: &[u8], n: usize) -> i32 {
    let (a, b) = (cstr(a), cstr(b));
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y || x == 0 {
            return x as i32 - y as i32;
        }
    }
    0
}

/// First position of `c`; searching for NUL finds the terminator
pub fn strchr(s: &[u8], c: u8) -> Option<usize> {
    let len = strlen(s);
    if c == 0 {
        return Some(len);
    }
    memchr(s, c, len)
}

/// Last position of `c`; searching for NUL finds the terminator
pub fn strrchr(s: &[u8], c: u8) -> Option<usize> {
    let s = cstr(s);
    if c == 0 {
        return Some(s.len());
    }
    s.iter().rposition(|&b| b == c)
}

/// First occurrence of the C string `needle`
pub fn strstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    memmem(cstr(haystack), cstr(needle))
}

/// Length of the initial run of bytes drawn from `accept`
pub fn strspn(s: &[u8], accept: &[u8]) -> usize {
    let accept = cstr(accept);
    cstr(s).iter().take_while(|b| accept.contains(b)).count()
}

/// Length of the initial run of bytes not in `reject`
pub fn strcspn(s: &[u8], reject: &[u8]) -> usize {
    let reject = cstr(reject);
    cstr(s).iter().take_while(|b| !reject.contains(b)).count()
}

/// Position of the first byte that appears in `accept`
pub fn strpbrk(s: &[u8], accept: &[u8]) -> Option<usize> {
    let s = cstr(s);
    let n = strcspn(s, accept);
    if n < s.len() {
        Some(n)
    } else {
        None
    }
}

/// Tokeniser state for [`strtok`]
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a [u8],
    delimiters: &'a [u8],
}

impl<'a> Tokens<'a> {
    /// Switch delimiter set between tokens
    pub fn set_delimiters(&mut self, delimiters: &'a [u8]) {
        self.delimiters = cstr(delimiters);
    }

    /// The unconsumed remainder
    pub fn remainder(&self) -> &'a [u8] {
        self.rest
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let skip = strspn(self.rest, self.delimiters);
        let rest = &self.rest[skip..];
        if rest.is_empty() {
            self.rest = rest;
            return None;
        }
        let len = strcspn(rest, self.delimiters);
        let token = &rest[..len];
        self.rest = rest.get(len + 1..).unwrap_or(&[]);
        Some(token)
    }
}

/// Split a C string on any of `delimiters`, skipping empty tokens
pub fn strtok<'a>(s: &'a [u8], delimiters: &'a [u8]) -> Tokens<'a> {
    Tokens {
        rest: cstr(s),
        delimiters: cstr(delimiters),
    }
}

pub fn tolower(c: u8) -> u8 {
    c.to_ascii_lowercase()
}

pub fn toupper(c: u8) -> u8 {
    c.to_ascii_uppercase()
}

/// Lower-case a C string in place
pub fn strlwr(s: &mut [u8]) {
    let len = strlen(s);
    s[..len].make_ascii_lowercase();
}

/// Upper-case a C string in place
pub fn strupr(s: &mut [u8]) {
    let len = strlen(s);
    s[..len].make_ascii_uppercase();
}

/// Set the first `n` bytes of `dest` to `c`
pub fn memset(dest: &mut [u8], c: u8, n: usize) -> bool {
    match dest.get_mut(..n) {
        Some(dest) => {
            dest.fill(c);
            true
        }
        None => false,
    }
}

/// Copy `n` bytes from `src` to `dest`
pub fn memcpy(dest: &mut [u8], src: &[u8], n: usize) -> bool {
    match (dest.get_mut(..n), src.get(..n)) {
        (Some(dest), Some(src)) => {
            dest.copy_from_slice(src);
            true
        }
        _ => false,
    }
}

/// Copy `n` bytes within `buf` from offset `src` to offset `dest`;
/// the ranges may overlap
pub fn memmove(buf: &mut [u8], dest: usize, src: usize, n: usize) -> bool {
    let fits = |at: usize| at.checked_add(n).map_or(false, |end| end <= buf.len());
    if !fits(dest) || !fits(src) {
        return false;
    }
    buf.copy_within(src..src + n, dest);
    true
}

/// Compare the first `n` bytes (clipped to the shorter slice)
pub fn memcmp(a: &[u8], b: &[u8], n: usize) -> i32 {
    let n = n.min(a.len()).min(b.len());
    a[..n]
        .iter()
        .zip(&b[..n])
        .find(|(x, y)| x != y)
        .map_or(0, |(x, y)| *x as i32 - *y as i32)
}

/// Position of `c` among the first `n` bytes
pub fn memchr(s: &[u8], c: u8, n: usize) -> Option<usize> {
    s.iter().take(n).position(|&b| b == c)
}

/// First occurrence of `needle` anywhere in `haystack` (NULs included)
pub fn memmem(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// The six C whitespace bytes
pub fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

/// Skip leading whitespace, returning the offset of the first other
/// byte
pub fn skip_space(s: &[u8]) -> usize {
    s.iter().take_while(|&&c| is_space(c)).count()
}

/// Byte-wise ordering of two C strings
pub fn ordering(a: &[u8], b: &[u8]) -> Ordering {
    strcmp(a, b).cmp(&0)
}
