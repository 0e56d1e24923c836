use std::fmt::Write;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use m3u8::{parse_attribute_list, parse_master, parse_media};

const BASE: &str = "https://cdn.example.com/live/index.m3u8";

fn benchmark_parsers(c: &mut Criterion) {
    let mut group = c.benchmark_group("Playlist Parsing");

    let master = create_master_playlist();
    group.bench_function("Master Playlist", |b| {
        b.iter(|| parse_master(black_box(&master), BASE).unwrap())
    });

    let media = create_media_playlist(500);
    group.bench_function("Media Playlist 500 Segments", |b| {
        b.iter(|| parse_media(black_box(&media), BASE).unwrap())
    });

    let attrs = "BANDWIDTH=2560000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\",NAME=\"720p\"";
    group.bench_function("Attribute List", |b| {
        b.iter(|| parse_attribute_list(black_box(attrs)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsers);
criterion_main!(benches);

fn create_master_playlist() -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:4\n");
    out.push_str(
        "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",LANGUAGE=\"en\",\
         DEFAULT=YES,AUTOSELECT=YES,URI=\"audio/en.m3u8\"\n",
    );
    for (bandwidth, width, height) in [
        (4_500_000u64, 1920u32, 1080u32),
        (2_560_000, 1280, 720),
        (1_200_000, 854, 480),
        (800_000, 640, 360),
    ] {
        let _ = writeln!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={width}x{height},\
             CODECS=\"avc1.4d401f,mp4a.40.2\",AUDIO=\"aud\"\n{height}p/index.m3u8"
        );
    }
    out
}

fn create_media_playlist(segments: usize) -> String {
    let mut out = String::from(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXT-X-PLAYLIST-TYPE:VOD\n",
    );
    for i in 0..segments {
        if i % 100 == 0 {
            let _ = writeln!(
                out,
                "#EXT-X-KEY:METHOD=AES-128,URI=\"keys/{i}.bin\",IV=0x{i:032x}"
            );
        }
        if i % 50 == 25 {
            out.push_str("#EXT-X-DISCONTINUITY\n");
        }
        let _ = writeln!(out, "#EXTINF:5.96,\nseg{i:05}.ts");
    }
    out.push_str("#EXT-X-ENDLIST\n");
    out
}
