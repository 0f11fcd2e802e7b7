//! Event-based GetCapabilities parser.
//!
//! One pass over the byte stream with an element stack for context. Layer
//! elements nest, so a second stack of in-progress layers applies the WMS
//! inheritance rules as the tree closes: CRS identifiers accumulate,
//! bounding boxes and scale values replace-inherit.

use globe_common::Sector;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::model::{RequestEndpoint, WmsCapabilities, WmsLayerEntry};

#[derive(Debug, thiserror::Error)]
pub enum CapabilitiesError {
    #[error("Malformed XML at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Not a WMS capabilities document: root element is <{0}>")]
    UnexpectedRoot(String),

    #[error("Invalid capabilities document: {0}")]
    DocumentStructure(String),
}

impl WmsCapabilities {
    /// Parse a capabilities document from raw bytes.
    ///
    /// Accepts both WMS 1.3.0 and 1.1.1 documents. The version string is
    /// taken verbatim from the root element; element content the model does
    /// not carry is skipped.
    pub fn parse(xml: &[u8]) -> Result<Self, CapabilitiesError> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut parser = Parser::default();
        let mut buf = Vec::new();

        loop {
            let position = reader.buffer_position();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = classify(e.local_name().as_ref());
                    parser.on_open(&e, tag, position)?;
                    parser.stack.push(tag);
                }
                Ok(Event::Empty(e)) => {
                    let tag = classify(e.local_name().as_ref());
                    parser.on_open(&e, tag, position)?;
                    parser.on_close(tag);
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|source| CapabilitiesError::Xml {
                        position,
                        source,
                    })?;
                    parser.on_text(&text)?;
                }
                Ok(Event::End(_)) => {
                    if let Some(tag) = parser.stack.pop() {
                        parser.on_close(tag);
                    }
                }
                Ok(Event::Eof) => break,
                Err(source) => {
                    return Err(CapabilitiesError::Xml {
                        position: reader.buffer_position(),
                        source,
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        parser.finish()
    }
}

/// Element names the parser dispatches on. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Service,
    Request,
    GetCapabilities,
    GetMap,
    Get,
    Post,
    Format,
    OnlineResource,
    Layer,
    Name,
    Title,
    Crs,
    GeoBbox,
    West,
    East,
    South,
    North,
    LatLonBbox,
    ScaleHint,
    MinScaleDenominator,
    MaxScaleDenominator,
    Other,
}

fn classify(local: &[u8]) -> Tag {
    match local {
        b"Service" => Tag::Service,
        b"Request" => Tag::Request,
        b"GetCapabilities" => Tag::GetCapabilities,
        b"GetMap" => Tag::GetMap,
        b"Get" => Tag::Get,
        b"Post" => Tag::Post,
        b"Format" => Tag::Format,
        b"OnlineResource" => Tag::OnlineResource,
        b"Layer" => Tag::Layer,
        b"Name" => Tag::Name,
        b"Title" => Tag::Title,
        // 1.3.0 writes CRS, 1.1.1 writes SRS. Same role.
        b"CRS" | b"SRS" => Tag::Crs,
        b"EX_GeographicBoundingBox" => Tag::GeoBbox,
        b"westBoundLongitude" => Tag::West,
        b"eastBoundLongitude" => Tag::East,
        b"southBoundLatitude" => Tag::South,
        b"northBoundLatitude" => Tag::North,
        b"LatLonBoundingBox" => Tag::LatLonBbox,
        b"ScaleHint" => Tag::ScaleHint,
        b"MinScaleDenominator" => Tag::MinScaleDenominator,
        b"MaxScaleDenominator" => Tag::MaxScaleDenominator,
        _ => Tag::Other,
    }
}

#[derive(Default)]
struct Parser {
    stack: Vec<Tag>,
    saw_root: bool,
    version: Option<String>,
    service_title: Option<String>,
    get_capabilities: RequestEndpoint,
    get_map: RequestEndpoint,
    root_layers: Vec<WmsLayerEntry>,
    layer_stack: Vec<LayerBuilder>,
    geo_bbox: Option<GeoBboxBuilder>,
}

#[derive(Default)]
struct LayerBuilder {
    name: Option<String>,
    title: Option<String>,
    crs: Vec<String>,
    geographic_bbox: Option<Sector>,
    min_scale_denominator: Option<f64>,
    max_scale_denominator: Option<f64>,
    min_scale_hint: Option<f64>,
    max_scale_hint: Option<f64>,
    children: Vec<WmsLayerEntry>,
}

#[derive(Default)]
struct GeoBboxBuilder {
    west: Option<f64>,
    east: Option<f64>,
    south: Option<f64>,
    north: Option<f64>,
}

impl Parser {
    /// Tag `up` levels above the top of the element stack (0 = top).
    fn at_depth(&self, up: usize) -> Tag {
        self.stack
            .len()
            .checked_sub(up + 1)
            .map(|i| self.stack[i])
            .unwrap_or(Tag::Other)
    }

    fn endpoint_mut(&mut self, operation: Tag) -> &mut RequestEndpoint {
        match operation {
            Tag::GetCapabilities => &mut self.get_capabilities,
            _ => &mut self.get_map,
        }
    }

    /// Called when an element opens, before it is pushed onto the stack, so
    /// the stack top is the parent of `e`.
    fn on_open(
        &mut self,
        e: &BytesStart,
        tag: Tag,
        position: usize,
    ) -> Result<(), CapabilitiesError> {
        if self.stack.is_empty() {
            return self.open_root(e, position);
        }

        match tag {
            Tag::Layer => self.open_layer(),
            Tag::GeoBbox => {
                if self.at_depth(0) == Tag::Layer {
                    self.geo_bbox = Some(GeoBboxBuilder::default());
                }
            }
            Tag::OnlineResource => self.open_online_resource(e, position)?,
            Tag::LatLonBbox => self.open_latlon_bbox(e, position)?,
            Tag::ScaleHint => self.open_scale_hint(e, position)?,
            _ => {}
        }
        Ok(())
    }

    fn on_close(&mut self, tag: Tag) {
        match tag {
            Tag::Layer => self.close_layer(),
            Tag::GeoBbox => self.close_geo_bbox(),
            _ => {}
        }
    }

    fn on_text(&mut self, text: &str) -> Result<(), CapabilitiesError> {
        match (self.at_depth(1), self.at_depth(0)) {
            (Tag::Service, Tag::Title) => {
                if self.service_title.is_none() {
                    self.service_title = Some(text.to_string());
                }
            }
            (operation @ (Tag::GetMap | Tag::GetCapabilities), Tag::Format)
                if self.at_depth(2) == Tag::Request =>
            {
                self.endpoint_mut(operation).formats.push(text.to_string());
            }
            (Tag::Layer, Tag::Name) => {
                if let Some(layer) = self.layer_stack.last_mut() {
                    layer.name = Some(text.to_string());
                }
            }
            (Tag::Layer, Tag::Title) => {
                if let Some(layer) = self.layer_stack.last_mut() {
                    layer.title = Some(text.to_string());
                }
            }
            (Tag::Layer, Tag::Crs) => {
                if let Some(layer) = self.layer_stack.last_mut() {
                    // 1.1.1 allows several identifiers in one SRS element.
                    for code in text.split_whitespace() {
                        if !layer.crs.iter().any(|c| c == code) {
                            layer.crs.push(code.to_string());
                        }
                    }
                }
            }
            (Tag::Layer, Tag::MinScaleDenominator) => {
                let value = parse_number(text, "MinScaleDenominator")?;
                if let Some(layer) = self.layer_stack.last_mut() {
                    layer.min_scale_denominator = Some(value);
                }
            }
            (Tag::Layer, Tag::MaxScaleDenominator) => {
                let value = parse_number(text, "MaxScaleDenominator")?;
                if let Some(layer) = self.layer_stack.last_mut() {
                    layer.max_scale_denominator = Some(value);
                }
            }
            (Tag::GeoBbox, side @ (Tag::West | Tag::East | Tag::South | Tag::North)) => {
                let value = parse_number(text, "EX_GeographicBoundingBox")?;
                if let Some(bbox) = self.geo_bbox.as_mut() {
                    match side {
                        Tag::West => bbox.west = Some(value),
                        Tag::East => bbox.east = Some(value),
                        Tag::South => bbox.south = Some(value),
                        _ => bbox.north = Some(value),
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn open_root(&mut self, e: &BytesStart, position: usize) -> Result<(), CapabilitiesError> {
        match e.local_name().as_ref() {
            b"WMS_Capabilities" | b"WMT_MS_Capabilities" => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"version" {
                        let value = attr
                            .unescape_value()
                            .map_err(|source| CapabilitiesError::Xml { position, source })?;
                        self.version = Some(value.into_owned());
                    }
                }
                if self.version.is_none() {
                    return Err(CapabilitiesError::DocumentStructure(
                        "capabilities root has no version attribute".to_string(),
                    ));
                }
                self.saw_root = true;
                Ok(())
            }
            other => Err(CapabilitiesError::UnexpectedRoot(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    fn open_layer(&mut self) {
        let inherited = match self.layer_stack.last() {
            Some(parent) => LayerBuilder {
                crs: parent.crs.clone(),
                geographic_bbox: parent.geographic_bbox,
                min_scale_denominator: parent.min_scale_denominator,
                max_scale_denominator: parent.max_scale_denominator,
                min_scale_hint: parent.min_scale_hint,
                max_scale_hint: parent.max_scale_hint,
                ..LayerBuilder::default()
            },
            None => LayerBuilder::default(),
        };
        self.layer_stack.push(inherited);
    }

    fn close_layer(&mut self) {
        if let Some(builder) = self.layer_stack.pop() {
            let entry = WmsLayerEntry {
                name: builder.name,
                title: builder.title,
                crs: builder.crs,
                geographic_bbox: builder.geographic_bbox,
                min_scale_denominator: builder.min_scale_denominator,
                max_scale_denominator: builder.max_scale_denominator,
                min_scale_hint: builder.min_scale_hint,
                max_scale_hint: builder.max_scale_hint,
                children: builder.children,
            };
            match self.layer_stack.last_mut() {
                Some(parent) => parent.children.push(entry),
                None => self.root_layers.push(entry),
            }
        }
    }

    fn close_geo_bbox(&mut self) {
        if let Some(bbox) = self.geo_bbox.take() {
            if let (Some(west), Some(east), Some(south), Some(north)) =
                (bbox.west, bbox.east, bbox.south, bbox.north)
            {
                if let Some(layer) = self.layer_stack.last_mut() {
                    layer.geographic_bbox = Some(Sector::new(south, north, west, east));
                }
            }
        }
    }

    fn open_online_resource(
        &mut self,
        e: &BytesStart,
        position: usize,
    ) -> Result<(), CapabilitiesError> {
        let binding = self.at_depth(0);
        if !matches!(binding, Tag::Get | Tag::Post) {
            return Ok(());
        }
        let operation = self
            .stack
            .iter()
            .rev()
            .copied()
            .find(|t| matches!(t, Tag::GetMap | Tag::GetCapabilities));
        let operation = match operation {
            Some(op) => op,
            None => return Ok(()),
        };

        for attr in e.attributes().flatten() {
            if attr.key.local_name().as_ref() == b"href" {
                let href = attr
                    .unescape_value()
                    .map_err(|source| CapabilitiesError::Xml { position, source })?
                    .into_owned();
                let endpoint = self.endpoint_mut(operation);
                let slot = match binding {
                    Tag::Get => &mut endpoint.get_url,
                    _ => &mut endpoint.post_url,
                };
                if slot.is_none() {
                    *slot = Some(href);
                }
            }
        }
        Ok(())
    }

    fn open_latlon_bbox(
        &mut self,
        e: &BytesStart,
        position: usize,
    ) -> Result<(), CapabilitiesError> {
        if self.at_depth(0) != Tag::Layer {
            return Ok(());
        }

        let mut min_lon = None;
        let mut min_lat = None;
        let mut max_lon = None;
        let mut max_lat = None;
        for attr in e.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map_err(|source| CapabilitiesError::Xml { position, source })?;
            match attr.key.local_name().as_ref() {
                b"minx" => min_lon = Some(parse_number(&value, "LatLonBoundingBox")?),
                b"miny" => min_lat = Some(parse_number(&value, "LatLonBoundingBox")?),
                b"maxx" => max_lon = Some(parse_number(&value, "LatLonBoundingBox")?),
                b"maxy" => max_lat = Some(parse_number(&value, "LatLonBoundingBox")?),
                _ => {}
            }
        }

        if let (Some(min_lon), Some(min_lat), Some(max_lon), Some(max_lat)) =
            (min_lon, min_lat, max_lon, max_lat)
        {
            if let Some(layer) = self.layer_stack.last_mut() {
                layer.geographic_bbox = Some(Sector::new(min_lat, max_lat, min_lon, max_lon));
            }
        }
        Ok(())
    }

    fn open_scale_hint(
        &mut self,
        e: &BytesStart,
        position: usize,
    ) -> Result<(), CapabilitiesError> {
        if self.at_depth(0) != Tag::Layer {
            return Ok(());
        }

        let mut min = None;
        let mut max = None;
        for attr in e.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map_err(|source| CapabilitiesError::Xml { position, source })?;
            match attr.key.local_name().as_ref() {
                b"min" => min = Some(parse_number(&value, "ScaleHint")?),
                b"max" => max = Some(parse_number(&value, "ScaleHint")?),
                _ => {}
            }
        }

        if let Some(layer) = self.layer_stack.last_mut() {
            if min.is_some() {
                layer.min_scale_hint = min;
            }
            if max.is_some() {
                layer.max_scale_hint = max;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<WmsCapabilities, CapabilitiesError> {
        if !self.saw_root {
            return Err(CapabilitiesError::DocumentStructure(
                "document contains no capabilities root".to_string(),
            ));
        }
        if !self.stack.is_empty() || !self.layer_stack.is_empty() {
            return Err(CapabilitiesError::DocumentStructure(
                "unexpected end of document".to_string(),
            ));
        }

        let version = self.version.take().ok_or_else(|| {
            CapabilitiesError::DocumentStructure(
                "capabilities root has no version attribute".to_string(),
            )
        })?;

        Ok(WmsCapabilities {
            version,
            service_title: self.service_title,
            get_capabilities: self.get_capabilities,
            get_map: self.get_map,
            layers: self.root_layers,
        })
    }
}

fn parse_number(text: &str, element: &str) -> Result<f64, CapabilitiesError> {
    text.trim().parse().map_err(|_| {
        CapabilitiesError::DocumentStructure(format!("Invalid number in <{}>: {}", element, text))
    })
}
