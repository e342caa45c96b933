//! Staged file path scheme
//!
//! Every blob the pipeline reads or writes lives under a key that encodes the
//! owning entity, the rendition and the file extension. The HTTP layer builds
//! these keys when staging an upload; workers rebuild the same values from the
//! key carried in the job payload. Keys round-trip: `parse(p.to_string()) == p`.
//!
//! | scheme | key |
//! |---|---|
//! | [`ProfilePicturePath`] | `users/{userId}/profile-pictures/{resolution}.{ext}` |
//! | [`CourseThumbnailPath`] | `courses/{courseId}/thumbnails/{resolution}.{ext}` |
//! | [`LectureVideoTemporaryPath`] | `courses/{courseId}/lectures/{lectureId}/{resolution}.{ext}` |

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A key that does not match the expected scheme.
///
/// Receiving one in a job payload is a programming error upstream, so workers
/// fail the job rather than retry it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed staged path '{path}': {reason}")]
pub struct MalformedPathError {
    pub path: String,
    pub reason: &'static str,
}

impl MalformedPathError {
    fn new(path: &str, reason: &'static str) -> Self {
        Self {
            path: path.to_string(),
            reason,
        }
    }
}

/// Rendition tag of a staged file: the untouched original or a pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    Original,
    Pixels(u32),
}

impl Resolution {
    pub fn is_original(&self) -> bool {
        matches!(self, Resolution::Original)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Original => f.write_str("original"),
            Resolution::Pixels(px) => write!(f, "{}", px),
        }
    }
}

impl FromStr for Resolution {
    type Err = MalformedPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "original" {
            return Ok(Resolution::Original);
        }
        // Only plain decimal digits, so "+5" or " 5" do not sneak through
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MalformedPathError::new(s, "resolution must be 'original' or a number"));
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(MalformedPathError::new(s, "resolution has leading zeros"));
        }
        match s.parse::<u32>() {
            Ok(0) | Err(_) => Err(MalformedPathError::new(s, "resolution out of range")),
            Ok(px) => Ok(Resolution::Pixels(px)),
        }
    }
}

/// Common surface of the staged path schemes.
pub trait StagedFilePath:
    fmt::Display + FromStr<Err = MalformedPathError> + Clone + Send + Sync + 'static
{
    /// Id of the entity whose record receives the processed result
    fn owner_id(&self) -> Uuid;

    fn resolution(&self) -> Resolution;

    fn extension(&self) -> &str;

    /// Sibling key for the same owner with another rendition tag and extension.
    fn with_rendition(&self, resolution: Resolution, extension: &str) -> Self;

    fn parse(path: &str) -> Result<Self, MalformedPathError> {
        path.parse()
    }
}

fn segments<'a>(path: &'a str, expected: usize) -> Result<Vec<&'a str>, MalformedPathError> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != expected {
        return Err(MalformedPathError::new(path, "unexpected number of segments"));
    }
    Ok(parts)
}

fn expect_literal(path: &str, actual: &str, literal: &str) -> Result<(), MalformedPathError> {
    if actual != literal {
        return Err(MalformedPathError::new(path, "unexpected path segment"));
    }
    Ok(())
}

/// Ids must be lowercase hyphenated so the parsed key serialises back to the
/// exact key that was staged.
fn parse_id(path: &str, segment: &str) -> Result<Uuid, MalformedPathError> {
    let id = Uuid::parse_str(segment)
        .map_err(|_| MalformedPathError::new(path, "owner id is not a uuid"))?;
    if id.hyphenated().to_string() != segment {
        return Err(MalformedPathError::new(path, "owner id is not in canonical form"));
    }
    Ok(id)
}

fn validate_extension(path: &str, extension: &str) -> Result<(), MalformedPathError> {
    if extension.is_empty() || !extension.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(MalformedPathError::new(path, "invalid file extension"));
    }
    Ok(())
}

/// Splits `{resolution}.{ext}`.
fn parse_file_name(path: &str, file: &str) -> Result<(Resolution, String), MalformedPathError> {
    let (resolution, extension) = file
        .split_once('.')
        .ok_or_else(|| MalformedPathError::new(path, "file name has no extension"))?;
    let resolution = resolution
        .parse::<Resolution>()
        .map_err(|e| MalformedPathError::new(path, e.reason))?;
    validate_extension(path, extension)?;
    Ok((resolution, extension.to_string()))
}

/// Profile picture of a user: `users/{userId}/profile-pictures/{resolution}.{ext}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfilePicturePath {
    user_id: Uuid,
    resolution: Resolution,
    extension: String,
}

impl ProfilePicturePath {
    pub fn new(user_id: Uuid, resolution: Resolution, extension: impl Into<String>) -> Self {
        Self {
            user_id,
            resolution,
            extension: extension.into(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

impl fmt::Display for ProfilePicturePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users/{}/profile-pictures/{}.{}",
            self.user_id, self.resolution, self.extension
        )
    }
}

impl FromStr for ProfilePicturePath {
    type Err = MalformedPathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let parts = segments(path, 4)?;
        expect_literal(path, parts[0], "users")?;
        expect_literal(path, parts[2], "profile-pictures")?;
        let user_id = parse_id(path, parts[1])?;
        let (resolution, extension) = parse_file_name(path, parts[3])?;
        Ok(Self {
            user_id,
            resolution,
            extension,
        })
    }
}

impl StagedFilePath for ProfilePicturePath {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn with_rendition(&self, resolution: Resolution, extension: &str) -> Self {
        Self::new(self.user_id, resolution, extension)
    }
}

/// Course thumbnail: `courses/{courseId}/thumbnails/{resolution}.{ext}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseThumbnailPath {
    course_id: Uuid,
    resolution: Resolution,
    extension: String,
}

impl CourseThumbnailPath {
    pub fn new(course_id: Uuid, resolution: Resolution, extension: impl Into<String>) -> Self {
        Self {
            course_id,
            resolution,
            extension: extension.into(),
        }
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }
}

impl fmt::Display for CourseThumbnailPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "courses/{}/thumbnails/{}.{}",
            self.course_id, self.resolution, self.extension
        )
    }
}

impl FromStr for CourseThumbnailPath {
    type Err = MalformedPathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let parts = segments(path, 4)?;
        expect_literal(path, parts[0], "courses")?;
        expect_literal(path, parts[2], "thumbnails")?;
        let course_id = parse_id(path, parts[1])?;
        let (resolution, extension) = parse_file_name(path, parts[3])?;
        Ok(Self {
            course_id,
            resolution,
            extension,
        })
    }
}

impl StagedFilePath for CourseThumbnailPath {
    fn owner_id(&self) -> Uuid {
        self.course_id
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn with_rendition(&self, resolution: Resolution, extension: &str) -> Self {
        Self::new(self.course_id, resolution, extension)
    }
}

/// Staged upload of a lecture video:
/// `courses/{courseId}/lectures/{lectureId}/{resolution}.{ext}`
///
/// The owner is the lecture; the course id scopes where segments are published.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LectureVideoTemporaryPath {
    course_id: Uuid,
    lecture_id: Uuid,
    resolution: Resolution,
    extension: String,
}

impl LectureVideoTemporaryPath {
    pub fn new(
        course_id: Uuid,
        lecture_id: Uuid,
        resolution: Resolution,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            course_id,
            lecture_id,
            resolution,
            extension: extension.into(),
        }
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn lecture_id(&self) -> Uuid {
        self.lecture_id
    }
}

impl fmt::Display for LectureVideoTemporaryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "courses/{}/lectures/{}/{}.{}",
            self.course_id, self.lecture_id, self.resolution, self.extension
        )
    }
}

impl FromStr for LectureVideoTemporaryPath {
    type Err = MalformedPathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let parts = segments(path, 5)?;
        expect_literal(path, parts[0], "courses")?;
        expect_literal(path, parts[2], "lectures")?;
        let course_id = parse_id(path, parts[1])?;
        let lecture_id = parse_id(path, parts[3])?;
        let (resolution, extension) = parse_file_name(path, parts[4])?;
        Ok(Self {
            course_id,
            lecture_id,
            resolution,
            extension,
        })
    }
}

impl StagedFilePath for LectureVideoTemporaryPath {
    fn owner_id(&self) -> Uuid {
        self.lecture_id
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn with_rendition(&self, resolution: Resolution, extension: &str) -> Self {
        Self::new(self.course_id, self.lecture_id, resolution, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn profile_picture_round_trip() {
        let path = ProfilePicturePath::new(id(1), Resolution::Pixels(512), "avif");
        let key = path.to_string();
        assert_eq!(
            key,
            "users/00000000-0000-0000-0000-000000000001/profile-pictures/512.avif"
        );
        let parsed: ProfilePicturePath = key.parse().unwrap();
        assert_eq!(parsed, path);
        assert_eq!(parsed.to_string(), key);
    }

    #[test]
    fn course_thumbnail_round_trip() {
        let path = CourseThumbnailPath::new(id(7), Resolution::Original, "bin");
        let parsed = CourseThumbnailPath::parse(&path.to_string()).unwrap();
        assert_eq!(parsed, path);
        assert_eq!(parsed.owner_id(), id(7));
        assert!(parsed.resolution().is_original());
    }

    #[test]
    fn lecture_video_round_trip_exposes_both_ids() {
        let path = LectureVideoTemporaryPath::new(id(2), id(3), Resolution::Original, "mp4");
        let key = path.to_string();
        assert_eq!(
            key,
            "courses/00000000-0000-0000-0000-000000000002/lectures/00000000-0000-0000-0000-000000000003/original.mp4"
        );
        let parsed: LectureVideoTemporaryPath = key.parse().unwrap();
        assert_eq!(parsed.course_id(), id(2));
        assert_eq!(parsed.lecture_id(), id(3));
        assert_eq!(parsed.owner_id(), id(3));
        assert_eq!(parsed.to_string(), key);
    }

    #[test]
    fn with_rendition_keeps_owner() {
        let staged = ProfilePicturePath::new(id(1), Resolution::Original, "bin");
        let rendition = staged.with_rendition(Resolution::Pixels(128), "avif");
        assert_eq!(rendition.user_id(), id(1));
        assert_eq!(rendition.resolution(), Resolution::Pixels(128));
        assert_eq!(rendition.extension(), "avif");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let err = "users/00000000-0000-0000-0000-000000000001/original.png"
            .parse::<ProfilePicturePath>()
            .unwrap_err();
        assert_eq!(err.reason, "unexpected number of segments");
    }

    #[test]
    fn rejects_scheme_of_another_kind() {
        let thumb = CourseThumbnailPath::new(id(1), Resolution::Original, "png").to_string();
        assert!(thumb.parse::<ProfilePicturePath>().is_err());
        assert!(thumb.parse::<LectureVideoTemporaryPath>().is_err());
    }

    #[test]
    fn rejects_bad_ids_resolutions_and_extensions() {
        let bad = [
            "users/not-a-uuid/profile-pictures/original.png",
            "users/00000000-0000-0000-0000-000000000001/profile-pictures/original",
            "users/00000000-0000-0000-0000-000000000001/profile-pictures/original.",
            "users/00000000-0000-0000-0000-000000000001/profile-pictures/0.png",
            "users/00000000-0000-0000-0000-000000000001/profile-pictures/big.png",
            "users/00000000-0000-0000-0000-000000000001/profile-pictures/-5.png",
            "users/00000000-0000-0000-0000-000000000001/profile-pictures/.png",
        ];
        for key in bad {
            assert!(key.parse::<ProfilePicturePath>().is_err(), "{key} should not parse");
        }
    }

    #[test]
    fn rejects_keys_that_would_not_serialise_back_unchanged() {
        let non_canonical = [
            "users/4B7C1E9A-2F1D-4E8A-9C3B-5D6E7F8A9B0C/profile-pictures/original.png",
            "users/4b7c1e9a2f1d4e8a9c3b5d6e7f8a9b0c/profile-pictures/original.png",
            "users/{4b7c1e9a-2f1d-4e8a-9c3b-5d6e7f8a9b0c}/profile-pictures/original.png",
            "users/urn:uuid:4b7c1e9a-2f1d-4e8a-9c3b-5d6e7f8a9b0c/profile-pictures/original.png",
            "users/4b7c1e9a-2f1d-4e8a-9c3b-5d6e7f8a9b0c/profile-pictures/0128.avif",
        ];
        for key in non_canonical {
            assert!(key.parse::<ProfilePicturePath>().is_err(), "{key} should not parse");
        }

        let canonical = "users/4b7c1e9a-2f1d-4e8a-9c3b-5d6e7f8a9b0c/profile-pictures/128.avif";
        let parsed: ProfilePicturePath = canonical.parse().unwrap();
        assert_eq!(parsed.to_string(), canonical);

        let lecture = "courses/0F8E2D6C-3A1B-4C5D-8E9F-A0B1C2D3E4F5/lectures/6a7b8c9d-0e1f-4a2b-9c3d-4e5f6a7b8c9d/original.mp4";
        assert!(lecture.parse::<LectureVideoTemporaryPath>().is_err());
    }

    #[test]
    fn resolution_parsing() {
        assert_eq!("original".parse::<Resolution>().unwrap(), Resolution::Original);
        assert_eq!("1024".parse::<Resolution>().unwrap(), Resolution::Pixels(1024));
        assert!("+5".parse::<Resolution>().is_err());
        assert!("007".parse::<Resolution>().is_err());
        assert!("".parse::<Resolution>().is_err());
    }
}
